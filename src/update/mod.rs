//! Atomic update-decision core.
//!
//! Everything here is pure decision logic executed under a key's exclusive
//! section; no module in this tree performs I/O.
//! - [`version`] - Entry versions and the per-partition version clock
//! - [`entry`] - Entry state
//! - [`intent`] - Update intents and their validation
//! - [`conflict`] - Cross-cluster conflict resolution
//! - [`ttl`] - TTL policy and wire sentinels
//! - [`deferred_delete`] - Tombstone retention for backup reconciliation
//! - [`processor`] - Entry processors and their invoker
//! - [`coordinator`] - The update coordinator and its result

pub mod conflict;
pub mod coordinator;
pub mod deferred_delete;
pub mod entry;
pub mod intent;
pub mod processor;
pub mod ttl;
pub mod version;
