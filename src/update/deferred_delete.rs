//! Deferred delete tracking.
//!
//! When a partition has backups, a remove keeps the removed entry's version
//! as a tombstone. A backup that missed the delete can then tell, during
//! reconciliation, that its copy was superseded instead of treating the key
//! as never deleted. Tombstones live for a bounded grace period in a
//! [`TombstoneQueue`] keyed by `(key, version)`.

use super::version::EntryVersion;
use bytes::Bytes;
use std::collections::VecDeque;

/// Decides whether a remove must retain a tombstone version.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeferredDeleteTracker;

impl DeferredDeleteTracker {
    /// Version to retain for a removed entry, if the topology requires it.
    pub fn on_remove(
        &self,
        key: &Bytes,
        version: EntryVersion,
        has_backups: bool,
    ) -> Option<EntryVersion> {
        if has_backups {
            tracing::trace!(key = ?key, %version, "retaining tombstone version");
            Some(version)
        } else {
            None
        }
    }
}

/// A retained tombstone awaiting purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tombstone {
    pub key: Bytes,
    pub version: EntryVersion,
    pub deadline_ms: u64,
}

/// Bounded purge queue for retained tombstones.
///
/// Entries are pushed with `now + grace_period`, so the queue stays ordered
/// by deadline as long as the clock does not run backwards. Stale entries
/// (the key was written again) are filtered by the purger, which compares
/// the stored version against the queued one.
#[derive(Debug)]
pub struct TombstoneQueue {
    grace_period_ms: u64,
    max_entries: usize,
    queue: VecDeque<Tombstone>,
}

impl TombstoneQueue {
    pub fn new(grace_period_ms: u64, max_entries: usize) -> Self {
        Self {
            grace_period_ms,
            max_entries: max_entries.max(1),
            queue: VecDeque::new(),
        }
    }

    /// Queue a tombstone.
    ///
    /// Returns tombstones evicted early because the queue is full.
    pub fn push(&mut self, key: Bytes, version: EntryVersion, now_ms: u64) -> Vec<Tombstone> {
        self.queue.push_back(Tombstone {
            key,
            version,
            deadline_ms: now_ms.saturating_add(self.grace_period_ms),
        });

        let mut evicted = Vec::new();
        while self.queue.len() > self.max_entries {
            if let Some(oldest) = self.queue.pop_front() {
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// Take every tombstone whose grace period has elapsed.
    pub fn collect_expired(&mut self, now_ms: u64) -> Vec<Tombstone> {
        let mut expired = Vec::new();
        while self
            .queue
            .front()
            .is_some_and(|t| t.deadline_ms <= now_ms)
        {
            if let Some(t) = self.queue.pop_front() {
                expired.push(t);
            }
        }
        expired
    }

    /// Next purge deadline.
    pub fn peek_next_deadline(&self) -> Option<u64> {
        self.queue.front().map(|t| t.deadline_ms)
    }

    pub fn grace_period_ms(&self) -> u64 {
        self.grace_period_ms
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
