//! Simulate command implementation.
//!
//! Replays a JSON script of writes against a primary partition whose backup
//! updates flow through a tokio channel into a backup partition. Each result
//! is printed as one JSON line, followed by a summary of both replicas.
//!
//! ```json
//! [
//!   {"op": "put", "key": "a", "value": "1", "ttl_ms": 5000},
//!   {"op": "append", "key": "a", "suffix": "2"},
//!   {"op": "remote_put", "key": "a", "value": "x",
//!    "version": {"cluster_id": 2, "topology_order": 1, "update_counter": 40}},
//!   {"op": "sql", "key": {"param": 0}, "expected": {"const": null},
//!    "new_value": {"param": 1}, "params": ["a", "y"]},
//!   {"op": "advance", "ms": 15000},
//!   {"op": "purge"}
//! ]
//! ```

use super::load_config;
use crate::core::config::{Config, ConfigOverrides};
use crate::core::time::ManualClock;
use crate::dml::fast_update::{FastUpdateArgument, FastUpdateArguments, SqlValue};
use crate::partition::replication::{ChannelSink, NoopSink};
use crate::partition::store::{Partition, PartitionStats};
use crate::update::conflict::ConflictOutcome;
use crate::update::coordinator::AtomicUpdateResult;
use crate::update::intent::UpdateIntent;
use crate::update::processor::{processor_fn, ProcessorError, ProcessorResult};
use crate::update::version::EntryVersion;
use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Replay a script of writes.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// JSON script of operations.
    #[arg(short, long)]
    pub script: PathBuf,

    /// Initial clock reading in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub start_ms: u64,
}

/// One scripted step.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptOp {
    Put {
        key: String,
        value: String,
        #[serde(default)]
        ttl_ms: Option<u64>,
        #[serde(default)]
        expected: Option<String>,
    },
    Remove {
        key: String,
        #[serde(default)]
        expected: Option<String>,
    },
    RemotePut {
        key: String,
        value: String,
        version: EntryVersion,
        #[serde(default)]
        expire_at_ms: Option<u64>,
    },
    RemoteRemove {
        key: String,
        version: EntryVersion,
    },
    /// Transform appending `suffix` to the current value.
    Append { key: String, suffix: String },
    /// Transform that removes the entry when present.
    Evict { key: String },
    /// Transform that always fails.
    Fail { key: String, message: String },
    /// Single-row UPDATE/DELETE through the fast path.
    Sql {
        key: ScriptOperand,
        expected: ScriptOperand,
        new_value: ScriptOperand,
        #[serde(default)]
        params: Vec<Option<String>>,
    },
    Advance { ms: u64 },
    Purge,
}

/// A fast-path operand in a script.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScriptOperand {
    Param { param: usize },
    Const {
        #[serde(rename = "const")]
        value: Option<String>,
    },
}

impl ScriptOperand {
    fn to_argument(&self, param_count: usize) -> Result<FastUpdateArgument> {
        Ok(match self {
            Self::Param { param } => FastUpdateArgument::parameter(*param, param_count)?,
            Self::Const { value } => FastUpdateArgument::Constant(value.clone().map(Bytes::from)),
        })
    }
}

/// JSON line printed per applied write.
#[derive(Debug, Serialize)]
struct ResultView {
    step: usize,
    key: String,
    success: bool,
    old_value: Option<String>,
    new_value: Option<String>,
    computed_result: Option<ComputedView>,
    new_ttl: i64,
    conflict_expire_time: i64,
    remove_version: Option<String>,
    conflict_outcome: Option<&'static str>,
    send_to_backup: bool,
    new_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ComputedView {
    Value(Option<String>),
    Failure(String),
}

#[derive(Debug, Serialize)]
struct ReplicaView {
    live_keys: usize,
    entries: Vec<(String, Option<String>)>,
    stats: PartitionStats,
}

#[derive(Debug, Serialize)]
struct SummaryView {
    primary: ReplicaView,
    backup: ReplicaView,
}

/// Initialize tracing subscriber if the telemetry feature is enabled.
#[cfg(feature = "telemetry")]
fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

#[cfg(not(feature = "telemetry"))]
fn init_tracing(_level: &str) {}

/// Run the simulate command.
pub async fn run_simulate(
    args: SimulateArgs,
    config_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    init_tracing(&config.telemetry.log_level);

    let script = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read script {:?}", args.script))?;
    let ops = parse_script(&script)?;

    for line in simulate(&config, &ops, args.start_ms).await? {
        println!("{}", line);
    }
    Ok(())
}

/// Parse a JSON script.
pub fn parse_script(script: &str) -> Result<Vec<ScriptOp>> {
    serde_json::from_str(script).context("invalid simulation script")
}

/// Replay `ops` and return the printed JSON lines.
pub async fn simulate(config: &Config, ops: &[ScriptOp], start_ms: u64) -> Result<Vec<String>> {
    let clock = Arc::new(ManualClock::new(start_ms));
    let (sink, mut rx) = ChannelSink::channel();
    let primary = Partition::from_config(config, clock.clone(), Arc::new(sink));

    let mut backup_config = config.clone();
    backup_config.partition.topology_order = config.partition.topology_order.saturating_add(1);
    let backup = Arc::new(Partition::from_config(
        &backup_config,
        clock.clone(),
        Arc::new(NoopSink),
    ));

    let backup_task = {
        let backup = backup.clone();
        tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                if let Err(err) = backup.apply_backup(&update) {
                    tracing::warn!(error = %err, key = ?update.key, "backup update rejected");
                }
            }
        })
    };

    let mut lines = Vec::with_capacity(ops.len() + 1);
    let mut keys = BTreeSet::new();

    for (step, op) in ops.iter().enumerate() {
        match op {
            ScriptOp::Advance { ms } => {
                let now = clock.advance(*ms);
                tracing::debug!(step, now_ms = now, "clock advanced");
            }
            ScriptOp::Purge => {
                let purged = primary.purge_tombstones();
                tracing::info!(step, purged, "tombstones purged");
            }
            _ => {
                let intent = build_intent(op)?;
                let key = intent.key.clone();
                let result = primary
                    .update(intent)
                    .with_context(|| format!("step {} rejected", step))?;
                keys.insert(key.clone());
                lines.push(serde_json::to_string(&view(step, &key, &result))?);
            }
        }
    }

    let primary_view = replica_view(&primary, &keys);
    // Dropping the primary closes the channel so the backup task drains and exits.
    drop(primary);
    backup_task.await.context("backup task failed")?;
    backup.purge_tombstones();

    let summary = SummaryView {
        primary: primary_view,
        backup: replica_view(&backup, &keys),
    };
    lines.push(serde_json::to_string(&summary)?);
    Ok(lines)
}

fn replica_view(partition: &Partition, keys: &BTreeSet<Bytes>) -> ReplicaView {
    ReplicaView {
        live_keys: partition.live_key_count(),
        entries: keys
            .iter()
            .map(|key| (lossy(key), partition.get(key).as_ref().map(lossy)))
            .collect(),
        stats: partition.stats(),
    }
}

fn build_intent(op: &ScriptOp) -> Result<UpdateIntent> {
    let intent = match op {
        ScriptOp::Put {
            key,
            value,
            ttl_ms,
            expected,
        } => {
            let mut intent = UpdateIntent::put(key.clone(), value.clone());
            if let Some(ttl) = ttl_ms {
                intent = intent.with_ttl(*ttl);
            }
            with_expected(intent, expected)
        }
        ScriptOp::Remove { key, expected } => with_expected(UpdateIntent::remove(key.clone()), expected),
        ScriptOp::RemotePut {
            key,
            value,
            version,
            expire_at_ms,
        } => {
            let intent = UpdateIntent::put(key.clone(), value.clone()).replicated(*version);
            match expire_at_ms {
                Some(at) => intent.with_remote_expire_time(*at),
                None => intent,
            }
        }
        ScriptOp::RemoteRemove { key, version } => {
            UpdateIntent::remove(key.clone()).replicated(*version)
        }
        ScriptOp::Append { key, suffix } => UpdateIntent::transform(
            key.clone(),
            processor_fn("append", |entry, args| {
                let mut buf = BytesMut::new();
                if let Some(current) = entry.value() {
                    buf.extend_from_slice(current);
                }
                for arg in args {
                    buf.extend_from_slice(arg);
                }
                let value = buf.freeze();
                entry.set_value(value.clone());
                Ok(Some(value))
            }),
            vec![Bytes::from(suffix.clone())],
        ),
        ScriptOp::Evict { key } => UpdateIntent::transform(
            key.clone(),
            processor_fn("evict", |entry, _args| {
                let previous = entry.value().cloned();
                if entry.exists() {
                    entry.remove();
                }
                Ok(previous)
            }),
            Vec::new(),
        ),
        ScriptOp::Fail { key, message } => {
            let message = message.clone();
            UpdateIntent::transform(
                key.clone(),
                processor_fn("fail", move |_entry, _args| Err(ProcessorError::new(message.clone()))),
                Vec::new(),
            )
        }
        ScriptOp::Sql {
            key,
            expected,
            new_value,
            params,
        } => {
            let count = params.len();
            let args = FastUpdateArguments::new(
                key.to_argument(count)?,
                expected.to_argument(count)?,
                new_value.to_argument(count)?,
            );
            let params: Vec<SqlValue> = params
                .iter()
                .map(|p| p.clone().map(Bytes::from))
                .collect();
            args.to_intent(&params)?
        }
        ScriptOp::Advance { .. } | ScriptOp::Purge => {
            anyhow::bail!("{:?} is not a write", op)
        }
    };
    Ok(intent)
}

fn with_expected(intent: UpdateIntent, expected: &Option<String>) -> UpdateIntent {
    match expected {
        Some(expected) => intent.with_expected(expected.clone()),
        None => intent,
    }
}

fn view(step: usize, key: &Bytes, result: &AtomicUpdateResult) -> ResultView {
    ResultView {
        step,
        key: lossy(key),
        success: result.success(),
        old_value: result.old_value().map(lossy),
        new_value: result.new_value().map(lossy),
        computed_result: result.computed_result().map(|computed| match computed {
            ProcessorResult::Value(value) => ComputedView::Value(value.as_ref().map(lossy)),
            ProcessorResult::Failure(err) => ComputedView::Failure(err.message.clone()),
        }),
        new_ttl: result.new_ttl().to_raw(),
        conflict_expire_time: result.conflict_expire_time().to_raw(),
        remove_version: result.remove_version().map(|v| v.to_string()),
        conflict_outcome: result.conflict_outcome().map(|outcome| match outcome {
            ConflictOutcome::UseOld => "use_old",
            ConflictOutcome::UseNew => "use_new",
            ConflictOutcome::Merge { .. } => "merge",
        }),
        send_to_backup: result.send_to_backup(),
        new_version: result.new_version().map(|v| v.to_string()),
    }
}

fn lossy(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
