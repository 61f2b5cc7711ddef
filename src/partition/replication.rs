//! Replication hand-off.
//!
//! After a write commits and its exclusive section is released, the primary
//! converts the exact [`AtomicUpdateResult`] into a [`BackupUpdate`] and hands
//! it to a [`ReplicationSink`]. The transport behind the sink is external;
//! this module only defines the message and the boundary.

use crate::core::error::TesseraResult;
use crate::update::coordinator::AtomicUpdateResult;
use crate::update::ttl::{ExpireTime, Ttl};
use crate::update::version::EntryVersion;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Update shipped from a primary to its backups.
///
/// TTL and expire time travel in their raw sentinel encoding
/// (`TTL_NOT_CHANGED`, `EXPIRE_TIME_CALCULATE`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupUpdate {
    pub partition_id: u32,
    pub key: Bytes,
    /// New value; `None` for a remove.
    pub value: Option<Bytes>,
    /// Version stamped by the primary.
    pub version: EntryVersion,
    /// Version of the removed entry, when a tombstone is retained.
    pub remove_version: Option<EntryVersion>,
    pub ttl_raw: i64,
    pub expire_time_raw: i64,
}

impl BackupUpdate {
    /// Build the backup message for a result.
    ///
    /// Returns `None` when the result must not be propagated.
    pub fn from_result(partition_id: u32, key: &Bytes, result: &AtomicUpdateResult) -> Option<Self> {
        if !result.send_to_backup() {
            return None;
        }
        let version = result.new_version()?;
        Some(Self {
            partition_id,
            key: key.clone(),
            value: result.new_value().cloned(),
            version,
            remove_version: result.remove_version(),
            ttl_raw: result.new_ttl().to_raw(),
            expire_time_raw: result.conflict_expire_time().to_raw(),
        })
    }

    pub fn is_remove(&self) -> bool {
        self.value.is_none()
    }

    pub fn new_ttl(&self) -> TesseraResult<Ttl> {
        Ttl::from_raw(self.ttl_raw)
    }

    pub fn expire_time(&self) -> TesseraResult<ExpireTime> {
        ExpireTime::from_raw(self.expire_time_raw)
    }

    /// Serialize for the transport.
    pub fn encode(&self) -> TesseraResult<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from the transport.
    pub fn decode(bytes: &[u8]) -> TesseraResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Destination for backup updates.
pub trait ReplicationSink: Send + Sync {
    fn send(&self, update: BackupUpdate);
}

/// Sink that drops every update (partitions without backups).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ReplicationSink for NoopSink {
    fn send(&self, _update: BackupUpdate) {}
}

/// Sink backed by an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<BackupUpdate>,
}

impl ChannelSink {
    /// Create a sink and the receiver a backup task drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BackupUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReplicationSink for ChannelSink {
    fn send(&self, update: BackupUpdate) {
        if let Err(err) = self.tx.send(update) {
            tracing::warn!(
                key = ?err.0.key,
                version = %err.0.version,
                "backup channel closed; update dropped"
            );
        }
    }
}
