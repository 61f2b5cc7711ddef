//! Update intents.
//!
//! An [`UpdateIntent`] describes one write to one key as built by the cache
//! API layer or the DML fast path. Shapes that make no sense for the
//! operation kind are rejected by [`UpdateIntent::validate`] before the key's
//! exclusive section is taken.

use super::processor::EntryProcessor;
use super::version::EntryVersion;
use crate::core::error::{TesseraError, TesseraResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Put,
    Remove,
    Transform,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put => write!(f, "put"),
            Self::Remove => write!(f, "remove"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// Write payload.
#[derive(Clone)]
pub enum Operation {
    /// Store a new value.
    Put(Bytes),
    /// Logically delete the entry.
    Remove,
    /// Run a processor against the old value.
    Transform {
        processor: Arc<dyn EntryProcessor>,
        args: Vec<Bytes>,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Put(_) => OperationKind::Put,
            Self::Remove => OperationKind::Remove,
            Self::Transform { .. } => OperationKind::Transform,
        }
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put(value) => f.debug_tuple("Put").field(value).finish(),
            Self::Remove => write!(f, "Remove"),
            Self::Transform { processor, args } => f
                .debug_struct("Transform")
                .field("processor", &processor.name())
                .field("args", args)
                .finish(),
        }
    }
}

/// One write to one key.
#[derive(Debug, Clone)]
pub struct UpdateIntent {
    /// Target key.
    pub key: Bytes,

    /// What to write.
    pub operation: Operation,

    /// Explicit TTL in milliseconds (0 = eternal).
    pub explicit_ttl: Option<u64>,

    /// Version assigned by the originating cluster (cross-cluster writes only).
    pub remote_version: Option<EntryVersion>,

    /// Expire time assigned by the originating cluster.
    pub remote_expire_time: Option<u64>,

    /// Write only if the current live value equals this.
    pub expected: Option<Bytes>,

    /// Write only if a live value exists (replace semantics).
    pub require_existing: bool,
}

impl UpdateIntent {
    fn new(key: Bytes, operation: Operation) -> Self {
        Self {
            key,
            operation,
            explicit_ttl: None,
            remote_version: None,
            remote_expire_time: None,
            expected: None,
            require_existing: false,
        }
    }

    /// Put `value` under `key`.
    pub fn put(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self::new(key.into(), Operation::Put(value.into()))
    }

    /// Remove `key`.
    pub fn remove(key: impl Into<Bytes>) -> Self {
        Self::new(key.into(), Operation::Remove)
    }

    /// Transform `key` in place with `processor`.
    pub fn transform(
        key: impl Into<Bytes>,
        processor: Arc<dyn EntryProcessor>,
        args: Vec<Bytes>,
    ) -> Self {
        Self::new(key.into(), Operation::Transform { processor, args })
    }

    /// Set an explicit TTL.
    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.explicit_ttl = Some(ttl_ms);
        self
    }

    /// Mark this intent as a write replicated from another cluster.
    pub fn replicated(mut self, version: EntryVersion) -> Self {
        self.remote_version = Some(version);
        self
    }

    /// Carry the originating cluster's expire time.
    pub fn with_remote_expire_time(mut self, expire_at_ms: u64) -> Self {
        self.remote_expire_time = Some(expire_at_ms);
        self
    }

    /// Only write if the current value equals `expected`.
    pub fn with_expected(mut self, expected: impl Into<Bytes>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Only write if the key currently holds a live value.
    pub fn require_existing(mut self) -> Self {
        self.require_existing = true;
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Check if conflict resolution applies to this intent.
    pub fn is_cross_cluster(&self) -> bool {
        self.remote_version.is_some()
    }

    /// Reject shapes that are invalid for the operation kind.
    pub fn validate(&self) -> TesseraResult<()> {
        if self.remote_expire_time.is_some() && self.remote_version.is_none() {
            return Err(TesseraError::invalid_intent(
                "remote expire time requires a remote version",
            ));
        }

        if let Some(remote) = &self.remote_version {
            if remote.update_counter == u64::MAX {
                return Err(TesseraError::invalid_intent(
                    "remote version counter is exhausted",
                ));
            }
        }

        if self.is_cross_cluster() {
            if matches!(self.operation, Operation::Transform { .. }) {
                return Err(TesseraError::invalid_intent(
                    "cross-cluster writes must carry a resolved value, not a transform",
                ));
            }
            if self.expected.is_some() || self.require_existing {
                return Err(TesseraError::invalid_intent(
                    "cross-cluster writes cannot carry a write condition",
                ));
            }
        }

        if matches!(self.operation, Operation::Transform { .. })
            && (self.expected.is_some() || self.require_existing)
        {
            return Err(TesseraError::invalid_intent(
                "transform intents cannot carry a write condition",
            ));
        }

        if matches!(self.operation, Operation::Remove) && self.explicit_ttl.is_some() {
            return Err(TesseraError::invalid_intent("remove cannot carry a TTL"));
        }

        Ok(())
    }
}
