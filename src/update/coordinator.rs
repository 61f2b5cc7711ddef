//! Update coordinator.
//!
//! [`UpdateCoordinator::apply`] is the single decision point for every write
//! to a cache entry. It runs while the caller holds the key's exclusive
//! section and returns one immutable [`AtomicUpdateResult`]. The coordinator
//! performs no I/O and never mutates the entry itself: the caller commits
//! the result locally and hands the very same result to replication.
//!
//! Decision order:
//! 1. Cross-cluster intents go through the [`ConflictResolver`]; `UseOld`
//!    suppresses the write.
//! 2. Write conditions (expected value, must exist) are checked against the
//!    live value.
//! 3. The new value comes from the intent, the merge outcome, or the
//!    [`EntryProcessorInvoker`].
//! 4. Vacuous writes (nothing before, nothing after) are suppressed.
//! 5. TTL and conflict expire time come from the [`TtlPolicy`].
//! 6. A version is adopted (cross-cluster `UseNew`) or minted. An exhausted
//!    version clock suppresses the write.
//! 7. Removals of live entries ask the [`DeferredDeleteTracker`] for a
//!    tombstone version.

use super::conflict::{ConflictContext, ConflictOutcome, ConflictResolver, LastWriterWins};
use super::deferred_delete::DeferredDeleteTracker;
use super::entry::EntryState;
use super::intent::{Operation, OperationKind, UpdateIntent};
use super::processor::{EntryProcessorInvoker, ProcessorResult};
use super::ttl::{stored_expiry, ExpireTime, Ttl, TtlPolicy};
use super::version::{EntryVersion, VersionClock};
use crate::core::config::Config;
use crate::core::time::Clock;
use bytes::Bytes;
use std::sync::Arc;

/// Per-partition context threaded into every coordinator call.
///
/// Holds the partition's version clock and time source so that no update
/// decision depends on ambient global state.
pub struct PartitionContext {
    partition_id: u32,
    versions: VersionClock,
    clock: Arc<dyn Clock>,
    backups: u32,
}

impl PartitionContext {
    pub fn new(
        partition_id: u32,
        cluster_id: u8,
        topology_order: u32,
        backups: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            partition_id,
            versions: VersionClock::new(cluster_id, topology_order),
            clock,
            backups,
        }
    }

    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.partition.partition_id,
            config.partition.cluster_id,
            config.partition.topology_order,
            config.partition.backups,
            clock,
        )
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn versions(&self) -> &VersionClock {
        &self.versions
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Check if removes must be tracked for deferred delete.
    pub fn has_backups(&self) -> bool {
        self.backups > 0
    }
}

impl std::fmt::Debug for PartitionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionContext")
            .field("partition_id", &self.partition_id)
            .field("versions", &self.versions)
            .field("backups", &self.backups)
            .finish()
    }
}

/// Authoritative outcome of one write.
///
/// Built once, never mutated. `success == false` means the entry must be
/// left exactly as it was and nothing is sent to backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicUpdateResult {
    success: bool,
    old_value: Option<Bytes>,
    new_value: Option<Bytes>,
    computed_result: Option<ProcessorResult>,
    new_ttl: Ttl,
    conflict_expire_time: ExpireTime,
    remove_version: Option<EntryVersion>,
    conflict_outcome: Option<ConflictOutcome>,
    send_to_backup: bool,
    new_version: Option<EntryVersion>,
    decided_at_ms: u64,
}

impl AtomicUpdateResult {
    /// A write that changes nothing. The new value mirrors the old one.
    fn suppressed(
        decided_at_ms: u64,
        old_value: Option<Bytes>,
        computed_result: Option<ProcessorResult>,
        conflict_outcome: Option<ConflictOutcome>,
    ) -> Self {
        Self {
            success: false,
            new_value: old_value.clone(),
            old_value,
            computed_result,
            new_ttl: Ttl::NotChanged,
            conflict_expire_time: ExpireTime::Calculate,
            remove_version: None,
            conflict_outcome,
            send_to_backup: false,
            new_version: None,
            decided_at_ms,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn old_value(&self) -> Option<&Bytes> {
        self.old_value.as_ref()
    }

    pub fn new_value(&self) -> Option<&Bytes> {
        self.new_value.as_ref()
    }

    /// Value computed by the entry processor (transforms only).
    pub fn computed_result(&self) -> Option<&ProcessorResult> {
        self.computed_result.as_ref()
    }

    /// [`Ttl::NotChanged`] if the stored TTL must be kept.
    pub fn new_ttl(&self) -> Ttl {
        self.new_ttl
    }

    /// Explicit expire time to propagate, or [`ExpireTime::Calculate`].
    pub fn conflict_expire_time(&self) -> ExpireTime {
        self.conflict_expire_time
    }

    /// Version of the removed entry, retained for deferred delete.
    pub fn remove_version(&self) -> Option<EntryVersion> {
        self.remove_version
    }

    /// Conflict resolution outcome, if resolution ran.
    pub fn conflict_outcome(&self) -> Option<&ConflictOutcome> {
        self.conflict_outcome.as_ref()
    }

    /// Whether the update must be propagated to backup replicas.
    pub fn send_to_backup(&self) -> bool {
        self.send_to_backup
    }

    /// Version stamped on the entry by this write (successful writes only).
    pub fn new_version(&self) -> Option<EntryVersion> {
        self.new_version
    }

    /// Clock reading the decision was made at.
    pub fn decided_at_ms(&self) -> u64 {
        self.decided_at_ms
    }

    /// Entry state to store for a successful write.
    ///
    /// `current` is the entry as stored before the write. Expiry is computed
    /// from the clock reading taken when the result was decided, so the
    /// commit never re-samples time. Returns `None` for unsuccessful
    /// results, which must not touch local state.
    pub fn committed_state(&self, key: &Bytes, current: Option<&EntryState>) -> Option<EntryState> {
        if !self.success {
            return None;
        }
        let version = self.new_version?;
        let now_ms = self.decided_at_ms;
        let live = current.filter(|c| c.live_value(now_ms).is_some());

        Some(match &self.new_value {
            Some(value) => {
                let (ttl_ms, expire_at_ms) =
                    stored_expiry(self.new_ttl, self.conflict_expire_time, live, now_ms);
                EntryState::new(key.clone(), value.clone(), version).with_ttl(ttl_ms, expire_at_ms)
            }
            None => EntryState::tombstone(key.clone(), version),
        })
    }
}

/// Orchestrates conflict resolution, TTL, deferred delete and processors.
pub struct UpdateCoordinator {
    resolver: Arc<dyn ConflictResolver>,
    ttl_policy: TtlPolicy,
    deferred_delete: DeferredDeleteTracker,
    invoker: EntryProcessorInvoker,
}

impl UpdateCoordinator {
    pub fn new(resolver: Arc<dyn ConflictResolver>, ttl_policy: TtlPolicy) -> Self {
        Self {
            resolver,
            ttl_policy,
            deferred_delete: DeferredDeleteTracker,
            invoker: EntryProcessorInvoker,
        }
    }

    /// Coordinator with last-writer-wins resolution.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(LastWriterWins),
            TtlPolicy::from_config(&config.ttl),
        )
    }

    pub fn resolver(&self) -> &dyn ConflictResolver {
        self.resolver.as_ref()
    }

    /// Decide the outcome of `intent` against `current`.
    ///
    /// The caller must hold the key's exclusive section for the whole call and
    /// must have validated the intent.
    pub fn apply(
        &self,
        ctx: &PartitionContext,
        current: Option<&EntryState>,
        intent: &UpdateIntent,
    ) -> AtomicUpdateResult {
        debug_assert!(intent.validate().is_ok(), "unvalidated intent: {:?}", intent);

        let now_ms = ctx.now_ms();
        let live = current.filter(|c| c.live_value(now_ms).is_some());
        let old_value = live.and_then(|c| c.value.clone());

        let conflict = ConflictContext::from_intent(current, intent)
            .map(|conflict_ctx| self.resolver.resolve(&conflict_ctx));

        if let Some(ConflictOutcome::UseOld) = conflict {
            tracing::debug!(
                partition = ctx.partition_id(),
                key = ?intent.key,
                resolver = self.resolver.name(),
                incoming = ?intent.remote_version,
                current = ?current.map(|c| c.version),
                "cross-cluster write suppressed by conflict resolution"
            );
            return AtomicUpdateResult::suppressed(now_ms, old_value, None, conflict);
        }

        if let Some(expected) = &intent.expected {
            if old_value.as_ref() != Some(expected) {
                tracing::trace!(key = ?intent.key, "expected value mismatch; write filtered");
                return AtomicUpdateResult::suppressed(now_ms, old_value, None, None);
            }
        }

        if intent.require_existing && old_value.is_none() {
            tracing::trace!(key = ?intent.key, "no live value to replace; write filtered");
            return AtomicUpdateResult::suppressed(now_ms, old_value, None, None);
        }

        let (new_value, computed_result) = match (&conflict, &intent.operation) {
            (Some(ConflictOutcome::Merge { value, .. }), _) => (Some(value.clone()), None),
            (_, Operation::Put(value)) => (Some(value.clone()), None),
            (_, Operation::Remove) => (None, None),
            (_, Operation::Transform { processor, args }) => {
                let outcome =
                    self.invoker
                        .invoke(&intent.key, old_value.as_ref(), processor.as_ref(), args);
                if !outcome.modified {
                    return AtomicUpdateResult::suppressed(
                        now_ms,
                        old_value,
                        Some(outcome.computed),
                        None,
                    );
                }
                (outcome.new_value, Some(outcome.computed))
            }
        };

        if old_value.is_none() && new_value.is_none() {
            tracing::trace!(key = ?intent.key, kind = %intent.kind(), "vacuous write skipped");
            return AtomicUpdateResult::suppressed(now_ms, old_value, computed_result, conflict);
        }

        let ttl = self.ttl_policy.compute(live, intent, conflict.as_ref());
        let Some(new_version) = self.next_version(ctx, current, intent, conflict.as_ref()) else {
            tracing::warn!(
                partition = ctx.partition_id(),
                key = ?intent.key,
                current = ?current.map(|c| c.version),
                "version counter exhausted; write suppressed"
            );
            return AtomicUpdateResult::suppressed(now_ms, old_value, computed_result, conflict);
        };

        let remove_version = match (new_value.is_none(), live) {
            (true, Some(removed)) => {
                self.deferred_delete
                    .on_remove(&intent.key, removed.version, ctx.has_backups())
            }
            _ => None,
        };

        tracing::trace!(
            partition = ctx.partition_id(),
            key = ?intent.key,
            kind = %intent.kind(),
            version = %new_version,
            removed = remove_version.is_some(),
            "update applied"
        );

        debug_assert_eq!(
            computed_result.is_some(),
            intent.kind() == OperationKind::Transform
        );

        AtomicUpdateResult {
            success: true,
            old_value,
            new_value,
            computed_result,
            new_ttl: ttl.new_ttl,
            conflict_expire_time: ttl.conflict_expire_time,
            remove_version,
            conflict_outcome: conflict,
            send_to_backup: true,
            new_version: Some(new_version),
            decided_at_ms: now_ms,
        }
    }

    fn next_version(
        &self,
        ctx: &PartitionContext,
        current: Option<&EntryState>,
        intent: &UpdateIntent,
        conflict: Option<&ConflictOutcome>,
    ) -> Option<EntryVersion> {
        let versions = ctx.versions();
        match (conflict, intent.remote_version) {
            (Some(ConflictOutcome::UseNew), Some(remote)) => {
                versions.observe(&remote);
                Some(remote)
            }
            (Some(ConflictOutcome::Merge { .. }), Some(remote)) => {
                versions.observe(&remote);
                let floor = current.map_or(remote, |c| c.version.max(remote));
                versions.next_after(Some(&floor))
            }
            _ => versions.next_after(current.map(|c| &c.version)),
        }
    }
}

impl std::fmt::Debug for UpdateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateCoordinator")
            .field("resolver", &self.resolver.name())
            .field("ttl_policy", &self.ttl_policy)
            .finish()
    }
}
