//! Time-to-live policy.
//!
//! The update path never ships absolute expire times by default: it ships a
//! TTL (or [`Ttl::NotChanged`]) and lets every replica compute its own
//! expiry. Only when conflict resolution or the originating cluster fixed a
//! concrete expire time is it carried as [`ExpireTime::At`], so backups
//! cannot diverge from the resolved outcome.

use super::conflict::ConflictOutcome;
use super::entry::EntryState;
use super::intent::{OperationKind, UpdateIntent};
use crate::core::config::TtlConfig;
use crate::core::error::{TesseraError, TesseraResult};
use crate::core::time;
use serde::{Deserialize, Serialize};

/// Wire sentinel: the stored TTL must not change.
pub const TTL_NOT_CHANGED: i64 = -1;

/// Wire value for an eternal TTL.
pub const TTL_ETERNAL: i64 = 0;

/// Wire sentinel: the receiver computes expiry from the TTL.
pub const EXPIRE_TIME_CALCULATE: i64 = -1;

/// Wire value for an eternal expire time.
pub const EXPIRE_TIME_ETERNAL: i64 = 0;

/// New TTL decided for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ttl {
    /// Keep whatever TTL is stored.
    NotChanged,
    /// Replace the TTL (0 = eternal).
    Millis(u64),
}

impl Ttl {
    /// Encode with the wire sentinels.
    pub fn to_raw(self) -> i64 {
        match self {
            Self::NotChanged => TTL_NOT_CHANGED,
            Self::Millis(ms) => i64::try_from(ms).unwrap_or(i64::MAX),
        }
    }

    /// Decode from the wire representation.
    pub fn from_raw(raw: i64) -> TesseraResult<Self> {
        match raw {
            TTL_NOT_CHANGED => Ok(Self::NotChanged),
            ms if ms >= 0 => Ok(Self::Millis(ms as u64)),
            other => Err(TesseraError::codec(format!("invalid raw TTL: {}", other))),
        }
    }
}

/// Expire time to propagate with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpireTime {
    /// Receivers compute expiry from the TTL.
    Calculate,
    /// Use this absolute expire time verbatim (0 = eternal).
    At(u64),
}

impl ExpireTime {
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Calculate => EXPIRE_TIME_CALCULATE,
            Self::At(ms) => i64::try_from(ms).unwrap_or(i64::MAX),
        }
    }

    pub fn from_raw(raw: i64) -> TesseraResult<Self> {
        match raw {
            EXPIRE_TIME_CALCULATE => Ok(Self::Calculate),
            ms if ms >= 0 => Ok(Self::At(ms as u64)),
            other => Err(TesseraError::codec(format!(
                "invalid raw expire time: {}",
                other
            ))),
        }
    }
}

/// TTL decision for one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlDecision {
    pub new_ttl: Ttl,
    pub conflict_expire_time: ExpireTime,
}

/// Computes new TTLs and conflict expire times.
#[derive(Debug, Clone, Default)]
pub struct TtlPolicy {
    /// TTL for entries created without an explicit TTL (0 = eternal).
    default_ttl_ms: u64,
    /// Clamp for explicit TTLs (0 = unbounded).
    max_ttl_ms: u64,
}

impl TtlPolicy {
    pub fn new(default_ttl_ms: u64, max_ttl_ms: u64) -> Self {
        Self {
            default_ttl_ms,
            max_ttl_ms,
        }
    }

    pub fn from_config(config: &TtlConfig) -> Self {
        Self::new(config.default_ttl_ms, config.max_ttl_ms)
    }

    /// Decide the TTL for a write.
    ///
    /// `live` is the current entry if it holds a live value; `None` when the
    /// write creates the entry.
    pub fn compute(
        &self,
        live: Option<&EntryState>,
        intent: &UpdateIntent,
        conflict: Option<&ConflictOutcome>,
    ) -> TtlDecision {
        let new_ttl = match (intent.kind(), intent.explicit_ttl) {
            (OperationKind::Remove, _) => Ttl::NotChanged,
            (_, Some(ttl_ms)) => Ttl::Millis(self.clamp(ttl_ms)),
            (_, None) if live.is_none() && self.default_ttl_ms > 0 => {
                Ttl::Millis(self.default_ttl_ms)
            }
            (_, None) => Ttl::NotChanged,
        };

        let conflict_expire_time = match conflict {
            Some(ConflictOutcome::Merge { expire_at_ms, .. }) => ExpireTime::At(*expire_at_ms),
            Some(ConflictOutcome::UseNew) => intent
                .remote_expire_time
                .map_or(ExpireTime::Calculate, ExpireTime::At),
            Some(ConflictOutcome::UseOld) | None => ExpireTime::Calculate,
        };

        TtlDecision {
            new_ttl,
            conflict_expire_time,
        }
    }

    fn clamp(&self, ttl_ms: u64) -> u64 {
        if self.max_ttl_ms > 0 && (ttl_ms == 0 || ttl_ms > self.max_ttl_ms) {
            self.max_ttl_ms
        } else {
            ttl_ms
        }
    }
}

/// Resolve the `(ttl_ms, expire_at_ms)` pair a replica stores for a write.
///
/// `current` is the entry as stored on that replica before the write.
pub fn stored_expiry(
    new_ttl: Ttl,
    expire_time: ExpireTime,
    current: Option<&EntryState>,
    now_ms: u64,
) -> (u64, Option<u64>) {
    let ttl_ms = match new_ttl {
        Ttl::NotChanged => current.map_or(0, |c| c.ttl_ms),
        Ttl::Millis(ms) => ms,
    };

    let expire_at_ms = match (expire_time, new_ttl) {
        (ExpireTime::At(0), _) => None,
        (ExpireTime::At(at), _) => Some(at),
        (ExpireTime::Calculate, Ttl::NotChanged) => match current {
            Some(c) => c.expire_at_ms,
            None => time::expire_at(now_ms, ttl_ms),
        },
        (ExpireTime::Calculate, Ttl::Millis(ms)) => time::expire_at(now_ms, ms),
    };

    (ttl_ms, expire_at_ms)
}
