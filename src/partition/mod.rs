//! Partition replica runtime.
//!
//! - [`store`] - Entry store, per-key exclusive sections, commit and purge
//! - [`replication`] - Backup update message and replication sink boundary

pub mod replication;
pub mod store;
