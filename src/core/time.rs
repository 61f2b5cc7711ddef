//! Clock sources.
//!
//! Every millisecond timestamp used by the update path (expiry checks,
//! expire-at computation, tombstone deadlines) comes from a [`Clock`] owned by
//! the partition context. Tests drive a [`ManualClock`] instead of sampling
//! wall-clock time.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time in milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since an epoch (implementation-defined).
    fn now_ms(&self) -> u64;
}

/// Wall-clock source (milliseconds since the Unix epoch).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    ms: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at the given millisecond value.
    pub fn new(ms: u64) -> Self {
        Self {
            ms: AtomicU64::new(ms),
        }
    }

    /// Set the current time.
    pub fn set(&self, ms: u64) {
        self.ms.store(ms, Ordering::Release);
    }

    /// Advance the current time, returning the new value.
    pub fn advance(&self, ms: u64) -> u64 {
        self.ms.fetch_add(ms, Ordering::AcqRel) + ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::Acquire)
    }
}

/// Compute an absolute expire time from a TTL.
///
/// A TTL of zero means the entry never expires.
pub fn expire_at(now_ms: u64, ttl_ms: u64) -> Option<u64> {
    if ttl_ms == 0 {
        None
    } else {
        Some(now_ms.saturating_add(ttl_ms))
    }
}
