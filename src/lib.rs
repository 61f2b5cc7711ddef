//! Tessera - atomic update-decision core for a partitioned, replicated key-value cache.
//!
//! Every write that reaches the primary copy of a key (a put, a remove, or a
//! transform run through a user-supplied entry processor, possibly carrying a
//! version minted by a remote cluster) is decided in one exclusive section:
//! conflict resolution, value computation, TTL computation, version minting
//! and deferred-delete bookkeeping all happen against the same snapshot of the
//! entry. The outcome is an immutable [`update::coordinator::AtomicUpdateResult`]
//! that the commit step and the backup replicas consume.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Write Sources                            │
//! │   cache API  │  entry processors  │  DML fast path  │  remote DC │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  UpdateIntent
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Partition (per-key lock)                    │
//! │   validate │ decide │ commit │ tombstone retention │ stats       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Update Coordinator                         │
//! │   conflict │ filter │ invoke │ TTL │ version │ deferred delete   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  AtomicUpdateResult
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Replication                              │
//! │          BackupUpdate │ ReplicationSink │ apply_backup          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::time`] - Clock abstraction and expiry arithmetic
//! - [`core::error`] - Error types
//!
//! ## Update
//! - [`update::coordinator`] - Atomic update decision and result
//! - [`update::conflict`] - Cross-cluster conflict resolution
//! - [`update::processor`] - Entry processors and the invoker
//! - [`update::ttl`] - TTL and expire-time policy
//! - [`update::version`] - Entry versions and the version clock
//! - [`update::deferred_delete`] - Tombstone retention
//!
//! ## Partition
//! - [`partition::store`] - Per-key exclusive sections and commit
//! - [`partition::replication`] - Backup update codec and sinks
//!
//! ## DML
//! - [`dml::fast_update`] - Single-row UPDATE/DELETE operands
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations
//!
//! # Key Invariants
//!
//! - A successful write carries a version strictly newer than the entry it replaced
//! - `send_to_backup` implies `success`
//! - A rejected write leaves the stored entry untouched
//! - Only transforms report a computed result

pub mod cli;
pub mod core;
pub mod dml;
pub mod partition;
pub mod update;

pub use crate::core::config::Config;
pub use crate::core::error::{TesseraError, TesseraResult};
pub use crate::partition::store::Partition;
pub use crate::update::coordinator::{AtomicUpdateResult, UpdateCoordinator};
pub use crate::update::intent::UpdateIntent;
