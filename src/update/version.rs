//! Entry versions and the per-partition version clock.
//!
//! Every successful local write mints a new [`EntryVersion`] from the
//! partition's [`VersionClock`] while the key's exclusive section is held.
//! Versions replicated from another cluster are adopted verbatim so their
//! causal history survives the hop.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicU64, Ordering};

/// Causal version stamp of a cache entry.
///
/// Ordered by `(update_counter, topology_order, cluster_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryVersion {
    /// Cluster (data center) that produced this version.
    pub cluster_id: u8,
    /// Topology order of the node that produced this version.
    pub topology_order: u32,
    /// Per-key update counter.
    pub update_counter: u64,
}

impl EntryVersion {
    /// Create a new version stamp.
    pub const fn new(cluster_id: u8, topology_order: u32, update_counter: u64) -> Self {
        Self {
            cluster_id,
            topology_order,
            update_counter,
        }
    }

    /// Check if this version strictly supersedes another.
    pub fn is_newer_than(&self, other: &EntryVersion) -> bool {
        self > other
    }
}

impl Ord for EntryVersion {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.update_counter
            .cmp(&other.update_counter)
            .then_with(|| self.topology_order.cmp(&other.topology_order))
            .then_with(|| self.cluster_id.cmp(&other.cluster_id))
    }
}

impl PartialOrd for EntryVersion {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for EntryVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ver:{}.{}@dc{}",
            self.update_counter, self.topology_order, self.cluster_id
        )
    }
}

/// Per-partition version clock.
///
/// Shared by all keys of one partition. Per-key monotonicity comes from
/// [`VersionClock::next_after`], which never returns a counter at or below
/// the entry's current one.
#[derive(Debug)]
pub struct VersionClock {
    cluster_id: u8,
    topology_order: u32,
    counter: AtomicU64,
}

impl VersionClock {
    /// Create a clock for the given local cluster id and topology order.
    pub fn new(cluster_id: u8, topology_order: u32) -> Self {
        Self {
            cluster_id,
            topology_order,
            counter: AtomicU64::new(0),
        }
    }

    /// Local cluster id.
    pub fn cluster_id(&self) -> u8 {
        self.cluster_id
    }

    /// Local topology order.
    pub fn topology_order(&self) -> u32 {
        self.topology_order
    }

    /// Last counter value handed out or observed.
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Mint a version that outranks `floor` (the entry's current version, if any).
    ///
    /// Returns `None` once the counter space is exhausted. The clock is left
    /// untouched in that case.
    ///
    /// Must only be called while the key's exclusive section is held.
    pub fn next_after(&self, floor: Option<&EntryVersion>) -> Option<EntryVersion> {
        let min = floor.map_or(0, |v| v.update_counter);
        let mut cur = self.counter.load(Ordering::Acquire);
        loop {
            let next = cur.max(min).checked_add(1)?;
            match self
                .counter
                .compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return Some(EntryVersion::new(self.cluster_id, self.topology_order, next)),
                Err(actual) => cur = actual,
            }
        }
    }

    /// Advance the clock so later local writes outrank an adopted remote version.
    pub fn observe(&self, version: &EntryVersion) {
        self.counter
            .fetch_max(version.update_counter, Ordering::AcqRel);
    }
}
