//! Cross-cluster conflict resolution.
//!
//! When a write replicated from another cluster races a local write to the
//! same key, a [`ConflictResolver`] decides which one survives. Resolvers are
//! pure: the same pair of version stamps always yields the same outcome,
//! independent of call order and wall-clock time.

use super::entry::EntryState;
use super::intent::{Operation, UpdateIntent};
use super::version::EntryVersion;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Outcome of conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictOutcome {
    /// Keep the current entry; the incoming write is suppressed.
    UseOld,
    /// Apply the incoming write with its remote version.
    UseNew,
    /// Apply an application-defined combination of both values.
    Merge {
        value: Bytes,
        /// Absolute expire time propagated verbatim to backups (0 = eternal).
        expire_at_ms: u64,
    },
}

impl ConflictOutcome {
    /// Check if the incoming write is suppressed.
    pub fn is_use_old(&self) -> bool {
        matches!(self, Self::UseOld)
    }
}

/// Input to a conflict resolver.
#[derive(Debug, Clone, Copy)]
pub struct ConflictContext<'a> {
    /// Current entry, including tombstones.
    pub current: Option<&'a EntryState>,
    /// Version assigned by the originating cluster.
    pub incoming_version: EntryVersion,
    /// Incoming value; `None` for a replicated remove.
    pub incoming_value: Option<&'a Bytes>,
    /// Expire time assigned by the originating cluster.
    pub incoming_expire_time: Option<u64>,
}

impl<'a> ConflictContext<'a> {
    /// Build a context for a cross-cluster intent.
    ///
    /// Returns `None` for local intents: a missing remote version is never
    /// defaulted into a resolvable context.
    pub fn from_intent(current: Option<&'a EntryState>, intent: &'a UpdateIntent) -> Option<Self> {
        let incoming_version = intent.remote_version?;
        let incoming_value = match &intent.operation {
            Operation::Put(value) => Some(value),
            Operation::Remove | Operation::Transform { .. } => None,
        };
        Some(Self {
            current,
            incoming_version,
            incoming_value,
            incoming_expire_time: intent.remote_expire_time,
        })
    }

    /// Version of the current entry, if any.
    pub fn current_version(&self) -> Option<EntryVersion> {
        self.current.map(|c| c.version)
    }
}

/// Pluggable conflict resolution policy.
pub trait ConflictResolver: Send + Sync {
    /// Decide between the current entry and the incoming write.
    fn resolve(&self, ctx: &ConflictContext<'_>) -> ConflictOutcome;

    /// Policy name used in log fields.
    fn name(&self) -> &str;
}

/// Default policy: the strictly greater version wins.
///
/// Versions compare by `(update_counter, topology_order, cluster_id)`. An
/// exact tie is a duplicate delivery and resolves to [`ConflictOutcome::UseOld`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LastWriterWins;

impl ConflictResolver for LastWriterWins {
    fn resolve(&self, ctx: &ConflictContext<'_>) -> ConflictOutcome {
        match ctx.current_version() {
            None => ConflictOutcome::UseNew,
            Some(current) if ctx.incoming_version.is_newer_than(&current) => {
                ConflictOutcome::UseNew
            }
            Some(_) => ConflictOutcome::UseOld,
        }
    }

    fn name(&self) -> &str {
        "last_writer_wins"
    }
}
