//! Cache entry state.
//!
//! Exactly one [`EntryState`] exists per key per partition replica. A missing
//! `value` marks the entry as logically deleted; its version is kept so later
//! conflict resolution and backup reconciliation can still order against it.

use super::version::EntryVersion;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// State of one cache entry on one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryState {
    /// The key.
    pub key: Bytes,

    /// Current value; `None` means logically deleted (tombstone).
    pub value: Option<Bytes>,

    /// Version of the last write applied to this entry.
    pub version: EntryVersion,

    /// Time-to-live in milliseconds (0 = eternal).
    pub ttl_ms: u64,

    /// Absolute expire time in milliseconds, if the entry expires.
    pub expire_at_ms: Option<u64>,
}

impl EntryState {
    /// Create a live, eternal entry.
    pub fn new(key: Bytes, value: Bytes, version: EntryVersion) -> Self {
        Self {
            key,
            value: Some(value),
            version,
            ttl_ms: 0,
            expire_at_ms: None,
        }
    }

    /// Create a tombstone for a removed entry.
    pub fn tombstone(key: Bytes, version: EntryVersion) -> Self {
        Self {
            key,
            value: None,
            version,
            ttl_ms: 0,
            expire_at_ms: None,
        }
    }

    /// Set the TTL and the matching absolute expire time.
    pub fn with_ttl(mut self, ttl_ms: u64, expire_at_ms: Option<u64>) -> Self {
        self.ttl_ms = ttl_ms;
        self.expire_at_ms = expire_at_ms;
        self
    }

    /// Check if this entry is a tombstone.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// Check if this entry has expired at the given time.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expire_at_ms.is_some_and(|at| now_ms >= at)
    }

    /// The value visible at the given time (absent when deleted or expired).
    pub fn live_value(&self, now_ms: u64) -> Option<&Bytes> {
        if self.is_expired_at(now_ms) {
            None
        } else {
            self.value.as_ref()
        }
    }
}
