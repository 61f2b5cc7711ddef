//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use bytes::Bytes;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tessera::core::config::Config;
use tessera::core::time::ManualClock;
use tessera::partition::replication::{BackupUpdate, ReplicationSink};
use tessera::partition::store::Partition;
use tessera::update::coordinator::{PartitionContext, UpdateCoordinator};
use tessera::update::entry::EntryState;
use tessera::update::version::EntryVersion;

/// Clock reading every test partition starts at.
pub const START_MS: u64 = 1_000_000;

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    write_config(
        r#"
[partition]
partition_id = 7
"#,
    )
}

/// Write arbitrary TOML to a temp file.
pub fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Sink that records every backup update.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<BackupUpdate>>,
}

impl RecordingSink {
    pub fn take(&self) -> Vec<BackupUpdate> {
        std::mem::take(&mut *self.updates.lock())
    }

    pub fn len(&self) -> usize {
        self.updates.lock().len()
    }
}

impl ReplicationSink for RecordingSink {
    fn send(&self, update: BackupUpdate) {
        self.updates.lock().push(update);
    }
}

/// A partition wired to a manual clock and a recording sink.
pub struct TestPartition {
    pub partition: Partition,
    pub clock: Arc<ManualClock>,
    pub sink: Arc<RecordingSink>,
}

/// Build a test partition from a configuration.
pub fn partition_with(config: &Config) -> TestPartition {
    let clock = Arc::new(ManualClock::new(START_MS));
    let sink = Arc::new(RecordingSink::default());
    let partition = Partition::from_config(config, clock.clone(), sink.clone());
    TestPartition {
        partition,
        clock,
        sink,
    }
}

/// Build a test partition with default configuration.
pub fn test_partition() -> TestPartition {
    partition_with(&Config::default())
}

/// Build a config with the given number of backups.
pub fn config_with_backups(backups: u32) -> Config {
    let mut config = Config::default();
    config.partition.backups = backups;
    config
}

/// Coordinator context on a manual clock.
pub fn context(backups: u32) -> (PartitionContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START_MS));
    let ctx = PartitionContext::new(0, 1, 1, backups, clock.clone());
    (ctx, clock)
}

/// Coordinator from default configuration.
pub fn coordinator() -> UpdateCoordinator {
    UpdateCoordinator::from_config(&Config::default())
}

/// Live entry with the given version counter.
pub fn live_entry(key: &str, value: &str, counter: u64) -> EntryState {
    EntryState::new(
        Bytes::from(key.to_string()),
        Bytes::from(value.to_string()),
        EntryVersion::new(1, 1, counter),
    )
}

pub fn bytes(s: &str) -> Bytes {
    Bytes::from(s.to_string())
}
