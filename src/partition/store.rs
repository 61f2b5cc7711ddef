//! Partition entry store with per-key exclusive sections.
//!
//! Each key owns a slot guarded by its own mutex, so updates to different
//! keys proceed in parallel while updates to one key are serialized for the
//! whole coordinator call (processors included). The slot map itself is only
//! locked long enough to look up or insert a slot, and it is never locked
//! while a slot is held.
//!
//! Slots whose entry is gone for good are *retired*: a thread that locks a
//! retired slot unlinks it and retries with a fresh one, so an update can
//! never land in a slot that has already been dropped from the map.

use super::replication::{BackupUpdate, ReplicationSink};
use crate::core::config::Config;
use crate::core::error::TesseraResult;
use crate::core::time::Clock;
use crate::update::coordinator::{AtomicUpdateResult, PartitionContext, UpdateCoordinator};
use crate::update::deferred_delete::{Tombstone, TombstoneQueue};
use crate::update::entry::EntryState;
use crate::update::intent::UpdateIntent;
use crate::update::ttl::stored_expiry;
use crate::update::version::EntryVersion;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slot {
    state: Option<EntryState>,
    retired: bool,
}

/// Partition counters.
#[derive(Debug, Default)]
struct PartitionCounters {
    updates_applied: AtomicU64,
    updates_suppressed: AtomicU64,
    backup_sends: AtomicU64,
    backup_applied: AtomicU64,
    backup_ignored: AtomicU64,
    tombstones_purged: AtomicU64,
}

/// Point-in-time partition statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PartitionStats {
    /// Successful primary writes.
    pub updates_applied: u64,
    /// Primary writes reported with `success == false`.
    pub updates_suppressed: u64,
    /// Updates handed to the replication sink.
    pub backup_sends: u64,
    /// Backup updates installed on this replica.
    pub backup_applied: u64,
    /// Backup updates ignored as stale or duplicate.
    pub backup_ignored: u64,
    /// Tombstones evicted after their grace period.
    pub tombstones_purged: u64,
    /// Tombstones awaiting purge.
    pub pending_tombstones: usize,
}

/// One partition replica: entry states, exclusive sections and the commit path.
pub struct Partition {
    ctx: PartitionContext,
    coordinator: UpdateCoordinator,
    slots: RwLock<HashMap<Bytes, Arc<Mutex<Slot>>>>,
    tombstones: Mutex<TombstoneQueue>,
    sink: Arc<dyn ReplicationSink>,
    counters: PartitionCounters,
}

impl Partition {
    pub fn new(
        ctx: PartitionContext,
        coordinator: UpdateCoordinator,
        tombstones: TombstoneQueue,
        sink: Arc<dyn ReplicationSink>,
    ) -> Self {
        Self {
            ctx,
            coordinator,
            slots: RwLock::new(HashMap::new()),
            tombstones: Mutex::new(tombstones),
            sink,
            counters: PartitionCounters::default(),
        }
    }

    /// Build a partition with last-writer-wins resolution from configuration.
    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ReplicationSink>,
    ) -> Self {
        Self::new(
            PartitionContext::from_config(config, clock),
            UpdateCoordinator::from_config(config),
            TombstoneQueue::new(
                config.tombstones.grace_period_ms,
                config.tombstones.max_tombstones,
            ),
            sink,
        )
    }

    pub fn context(&self) -> &PartitionContext {
        &self.ctx
    }

    /// Apply a write as the primary for its key.
    ///
    /// Invalid intents are rejected before the key's exclusive section is
    /// taken. Successful results are committed before the section is
    /// released; the replication sink receives the same result afterwards.
    pub fn update(&self, intent: UpdateIntent) -> TesseraResult<AtomicUpdateResult> {
        intent.validate()?;

        let key = intent.key.clone();
        let result = self.with_slot(&key, |slot| {
            let result = self
                .coordinator
                .apply(&self.ctx, slot.state.as_ref(), &intent);
            if let Some(next) = result.committed_state(&key, slot.state.as_ref()) {
                slot.state = Some(next);
            }
            result
        });

        if !result.success() {
            self.counters
                .updates_suppressed
                .fetch_add(1, Ordering::Relaxed);
            return Ok(result);
        }
        self.counters.updates_applied.fetch_add(1, Ordering::Relaxed);

        if result.new_value().is_none() {
            if let Some(version) = result.new_version() {
                self.retain_tombstone(key.clone(), version);
            }
        }

        if let Some(update) = BackupUpdate::from_result(self.ctx.partition_id(), &key, &result) {
            tracing::debug!(
                partition = self.ctx.partition_id(),
                key = ?key,
                version = %update.version,
                remove = update.is_remove(),
                "handing update to replication"
            );
            self.counters.backup_sends.fetch_add(1, Ordering::Relaxed);
            self.sink.send(update);
        }

        Ok(result)
    }

    /// Install a primary's update on this backup replica.
    ///
    /// Returns `false` when the update is not newer than the stored entry
    /// (tombstones included) and was ignored.
    pub fn apply_backup(&self, update: &BackupUpdate) -> TesseraResult<bool> {
        let new_ttl = update.new_ttl()?;
        let expire_time = update.expire_time()?;
        let now_ms = self.ctx.now_ms();

        let applied = self.with_slot(&update.key, |slot| {
            if let Some(current) = &slot.state {
                if !update.version.is_newer_than(&current.version) {
                    return false;
                }
            }

            let next = match &update.value {
                Some(value) => {
                    let live = slot
                        .state
                        .as_ref()
                        .filter(|c| c.live_value(now_ms).is_some());
                    let (ttl_ms, expire_at_ms) =
                        stored_expiry(new_ttl, expire_time, live, now_ms);
                    EntryState::new(update.key.clone(), value.clone(), update.version)
                        .with_ttl(ttl_ms, expire_at_ms)
                }
                None => EntryState::tombstone(update.key.clone(), update.version),
            };
            slot.state = Some(next);
            true
        });

        self.ctx.versions().observe(&update.version);

        if !applied {
            tracing::debug!(
                partition = self.ctx.partition_id(),
                key = ?update.key,
                version = %update.version,
                "stale backup update ignored"
            );
            self.counters.backup_ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }

        self.counters.backup_applied.fetch_add(1, Ordering::Relaxed);
        if update.is_remove() {
            self.retain_tombstone(update.key.clone(), update.version);
        }
        Ok(true)
    }

    /// Evict tombstones whose grace period has elapsed.
    ///
    /// Returns the number of entries evicted. Tombstones superseded by a
    /// later write are skipped.
    pub fn purge_tombstones(&self) -> usize {
        let expired = self.tombstones.lock().collect_expired(self.ctx.now_ms());
        let purged = expired.iter().filter(|t| self.purge_one(t)).count();
        if purged > 0 {
            tracing::debug!(
                partition = self.ctx.partition_id(),
                purged,
                "tombstones purged"
            );
        }
        purged
    }

    /// Live value for a key.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        let now_ms = self.ctx.now_ms();
        let slot = self.slots.read().get(key).cloned()?;
        let guard = slot.lock();
        guard
            .state
            .as_ref()
            .and_then(|s| s.live_value(now_ms))
            .cloned()
    }

    /// Stored entry for a key, tombstones and expired entries included.
    pub fn entry(&self, key: &[u8]) -> Option<EntryState> {
        let slot = self.slots.read().get(key).cloned()?;
        let guard = slot.lock();
        guard.state.clone()
    }

    /// Number of keys with a live value.
    pub fn live_key_count(&self) -> usize {
        let now_ms = self.ctx.now_ms();
        let slots: Vec<_> = self.slots.read().values().cloned().collect();
        slots
            .iter()
            .filter(|slot| {
                slot.lock()
                    .state
                    .as_ref()
                    .is_some_and(|s| s.live_value(now_ms).is_some())
            })
            .count()
    }

    pub fn stats(&self) -> PartitionStats {
        PartitionStats {
            updates_applied: self.counters.updates_applied.load(Ordering::Relaxed),
            updates_suppressed: self.counters.updates_suppressed.load(Ordering::Relaxed),
            backup_sends: self.counters.backup_sends.load(Ordering::Relaxed),
            backup_applied: self.counters.backup_applied.load(Ordering::Relaxed),
            backup_ignored: self.counters.backup_ignored.load(Ordering::Relaxed),
            tombstones_purged: self.counters.tombstones_purged.load(Ordering::Relaxed),
            pending_tombstones: self.tombstones.lock().len(),
        }
    }

    /// Run `f` inside the key's exclusive section.
    fn with_slot<R>(&self, key: &Bytes, f: impl FnOnce(&mut Slot) -> R) -> R {
        loop {
            let slot = self.slot(key);
            let mut guard = slot.lock();
            if guard.retired {
                drop(guard);
                self.unlink(key, &slot);
                continue;
            }

            let out = f(&mut guard);
            if guard.state.is_none() {
                guard.retired = true;
            }
            let retired = guard.retired;
            drop(guard);

            if retired {
                self.unlink(key, &slot);
            }
            return out;
        }
    }

    fn slot(&self, key: &Bytes) -> Arc<Mutex<Slot>> {
        if let Some(slot) = self.slots.read().get(key) {
            return slot.clone();
        }
        self.slots
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .clone()
    }

    fn unlink(&self, key: &Bytes, slot: &Arc<Mutex<Slot>>) {
        let mut slots = self.slots.write();
        if slots.get(key).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(key);
        }
    }

    fn retain_tombstone(&self, key: Bytes, version: EntryVersion) {
        let now_ms = self.ctx.now_ms();
        let overflow = self.tombstones.lock().push(key, version, now_ms);
        for tombstone in &overflow {
            self.purge_one(tombstone);
        }
    }

    fn purge_one(&self, tombstone: &Tombstone) -> bool {
        let Some(slot) = self.slots.read().get(&tombstone.key).cloned() else {
            return false;
        };

        let mut guard = slot.lock();
        let still_current = guard
            .state
            .as_ref()
            .is_some_and(|s| s.is_tombstone() && s.version == tombstone.version);
        if guard.retired || !still_current {
            return false;
        }
        guard.state = None;
        guard.retired = true;
        drop(guard);

        self.unlink(&tombstone.key, &slot);
        self.counters
            .tombstones_purged
            .fetch_add(1, Ordering::Relaxed);
        true
    }
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("ctx", &self.ctx)
            .field("coordinator", &self.coordinator)
            .field("slots", &self.slots.read().len())
            .finish()
    }
}
