//! Core infrastructure tests.

mod common;

use common::{create_minimal_config, write_config};
use tessera::core::config::{Config, ConfigOverrides};
use tessera::core::error::TesseraError;
use tessera::core::time::{expire_at, Clock, ManualClock, SystemClock};

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let file = create_minimal_config();
    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.partition.partition_id, 7);
    assert_eq!(config.partition.cluster_id, 1);
    assert_eq!(config.partition.topology_order, 1);
    assert_eq!(config.partition.backups, 1);
    assert_eq!(config.ttl.default_ttl_ms, 0);
    assert_eq!(config.ttl.max_ttl_ms, 0);
    assert_eq!(config.tombstones.grace_period_ms, 10_000);
    assert_eq!(config.tombstones.max_tombstones, 100_000);
    assert_eq!(config.conflict.policy, "last_writer_wins");
    assert_eq!(config.telemetry.log_level, "info");
}

#[test]
fn parse_empty_config_uses_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.partition.backups, 1);
    assert_eq!(config.tombstones.grace_period_ms, 10_000);
}

#[test]
fn parse_full_config() {
    let file = write_config(
        r#"
[partition]
partition_id = 12
cluster_id = 3
topology_order = 9
backups = 0

[ttl]
default_ttl_ms = 60000
max_ttl_ms = 3600000

[tombstones]
grace_period_ms = 500
max_tombstones = 16

[conflict]
policy = "last_writer_wins"

[telemetry]
log_level = "debug"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.partition.partition_id, 12);
    assert_eq!(config.partition.cluster_id, 3);
    assert_eq!(config.partition.topology_order, 9);
    assert_eq!(config.partition.backups, 0);
    assert_eq!(config.ttl.default_ttl_ms, 60_000);
    assert_eq!(config.ttl.max_ttl_ms, 3_600_000);
    assert_eq!(config.tombstones.grace_period_ms, 500);
    assert_eq!(config.tombstones.max_tombstones, 16);
    assert_eq!(config.telemetry.log_level, "debug");
}

#[test]
fn validate_default_ttl_above_max() {
    let result = Config::from_toml(
        r#"
[ttl]
default_ttl_ms = 10000
max_ttl_ms = 5000
"#,
    );
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("default_ttl_ms"));
}

#[test]
fn validate_default_ttl_with_unbounded_max() {
    let config = Config::from_toml(
        r#"
[ttl]
default_ttl_ms = 10000
"#,
    )
    .unwrap();
    assert_eq!(config.ttl.default_ttl_ms, 10_000);
}

#[test]
fn validate_zero_grace_period() {
    let result = Config::from_toml(
        r#"
[tombstones]
grace_period_ms = 0
"#,
    );
    assert!(result.unwrap_err().to_string().contains("grace_period_ms"));
}

#[test]
fn validate_zero_max_tombstones() {
    let result = Config::from_toml(
        r#"
[tombstones]
max_tombstones = 0
"#,
    );
    assert!(result.unwrap_err().to_string().contains("max_tombstones"));
}

#[test]
fn validate_unknown_conflict_policy() {
    let result = Config::from_toml(
        r#"
[conflict]
policy = "first_writer_wins"
"#,
    );
    assert!(result.unwrap_err().to_string().contains("policy"));
}

#[test]
fn validate_invalid_log_level() {
    let result = Config::from_toml(
        r#"
[telemetry]
log_level = "verbose"
"#,
    );
    assert!(result.unwrap_err().to_string().contains("log_level"));
}

#[test]
fn parse_malformed_toml() {
    let result = Config::from_toml("[partition\nbackups = ");
    assert!(result.is_err());
}

#[test]
fn missing_config_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/tessera.toml"));
    assert!(result.unwrap_err().to_string().contains("failed to read"));
}

#[test]
fn apply_overrides() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("trace".to_string()),
        backups: Some(3),
        cluster_id: Some(5),
    });
    assert_eq!(config.telemetry.log_level, "trace");
    assert_eq!(config.partition.backups, 3);
    assert_eq!(config.partition.cluster_id, 5);
}

#[test]
fn empty_overrides_keep_config() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides::default());
    assert_eq!(config.telemetry.log_level, "info");
    assert_eq!(config.partition.backups, 1);
}

// ============================================================================
// Error tests
// ============================================================================

#[test]
fn error_display() {
    let err = TesseraError::invalid_intent("remove cannot carry a TTL");
    assert_eq!(
        err.to_string(),
        "invalid update intent: remove cannot carry a TTL"
    );

    let err = TesseraError::parameter_out_of_range(3, 2);
    assert!(err.to_string().contains("index 3"));
    assert!(err.to_string().contains("2 parameters"));

    assert!(TesseraError::NullKey.to_string().contains("NULL"));
    assert!(TesseraError::codec("truncated").to_string().contains("truncated"));
}

#[test]
fn error_classification() {
    assert!(TesseraError::invalid_intent("x").is_precondition_violation());
    assert!(TesseraError::parameter_out_of_range(0, 0).is_precondition_violation());
    assert!(TesseraError::NullKey.is_precondition_violation());
    assert!(!TesseraError::codec("x").is_precondition_violation());
}

// ============================================================================
// Time tests
// ============================================================================

#[test]
fn manual_clock_set_and_advance() {
    let clock = ManualClock::new(100);
    assert_eq!(clock.now_ms(), 100);

    assert_eq!(clock.advance(50), 150);
    assert_eq!(clock.now_ms(), 150);

    clock.set(10);
    assert_eq!(clock.now_ms(), 10);
}

#[test]
fn system_clock_is_after_epoch() {
    // 2020-01-01T00:00:00Z
    assert!(SystemClock.now_ms() > 1_577_836_800_000);
}

#[test]
fn expire_at_from_ttl() {
    assert_eq!(expire_at(1_000, 0), None);
    assert_eq!(expire_at(1_000, 250), Some(1_250));
    assert_eq!(expire_at(u64::MAX - 1, 10), Some(u64::MAX));
}
