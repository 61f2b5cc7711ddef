//! Entry processors (in-place transforms).
//!
//! A processor runs synchronously inside the key's exclusive section against
//! a [`MutableEntry`] view of the old value. Whatever it returns becomes the
//! operation's computed result. Errors and panics are captured as
//! [`ProcessorResult::Failure`] and the entry is left untouched.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Error raised by an entry processor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("entry processor failed: {message}")]
pub struct ProcessorError {
    pub message: String,
}

impl ProcessorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Application-visible outcome of a transform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorResult {
    /// The processor completed and returned this value.
    Value(Option<Bytes>),
    /// The processor failed; the entry was not modified.
    Failure(ProcessorError),
}

impl ProcessorResult {
    /// Check if the processor failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Returned value, if the processor completed.
    pub fn value(&self) -> Option<&Bytes> {
        match self {
            Self::Value(v) => v.as_ref(),
            Self::Failure(_) => None,
        }
    }
}

/// Mutable view of an entry handed to a processor.
///
/// Changes are staged here and only reach the entry if the processor
/// returns successfully.
#[derive(Debug)]
pub struct MutableEntry {
    key: Bytes,
    value: Option<Bytes>,
    modified: bool,
}

impl MutableEntry {
    fn new(key: Bytes, value: Option<Bytes>) -> Self {
        Self {
            key,
            value,
            modified: false,
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Replace the value.
    pub fn set_value(&mut self, value: impl Into<Bytes>) {
        self.value = Some(value.into());
        self.modified = true;
    }

    /// Remove the entry.
    pub fn remove(&mut self) {
        self.value = None;
        self.modified = true;
    }

    /// Check if the processor staged a change.
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

/// An in-place read-modify-write operation.
///
/// Implementations must be fast and must not block on I/O or touch other keys:
/// they run while the key's exclusive section is held.
pub trait EntryProcessor: Send + Sync {
    /// Transform the entry, returning the computed result for the caller.
    fn process(&self, entry: &mut MutableEntry, args: &[Bytes])
        -> Result<Option<Bytes>, ProcessorError>;

    /// Name used in log fields.
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Processor backed by a closure.
pub struct FnProcessor<F> {
    name: String,
    f: F,
}

impl<F> EntryProcessor for FnProcessor<F>
where
    F: Fn(&mut MutableEntry, &[Bytes]) -> Result<Option<Bytes>, ProcessorError> + Send + Sync,
{
    fn process(
        &self,
        entry: &mut MutableEntry,
        args: &[Bytes],
    ) -> Result<Option<Bytes>, ProcessorError> {
        (self.f)(entry, args)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a closure as a shareable processor.
pub fn processor_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn EntryProcessor>
where
    F: Fn(&mut MutableEntry, &[Bytes]) -> Result<Option<Bytes>, ProcessorError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnProcessor {
        name: name.into(),
        f,
    })
}

/// Outcome of one processor invocation.
#[derive(Debug, Clone)]
pub struct InvokeOutcome {
    /// Value after the transform; equals the old value unless `modified`.
    pub new_value: Option<Bytes>,
    /// Whether the processor staged a change and completed successfully.
    pub modified: bool,
    /// Result returned to the originating caller.
    pub computed: ProcessorResult,
}

/// Runs entry processors and captures their failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntryProcessorInvoker;

impl EntryProcessorInvoker {
    /// Invoke a processor against the old value.
    pub fn invoke(
        &self,
        key: &Bytes,
        old_value: Option<&Bytes>,
        processor: &dyn EntryProcessor,
        args: &[Bytes],
    ) -> InvokeOutcome {
        let mut entry = MutableEntry::new(key.clone(), old_value.cloned());

        let outcome = catch_unwind(AssertUnwindSafe(|| processor.process(&mut entry, args)))
            .unwrap_or_else(|payload| Err(ProcessorError::new(panic_message(payload.as_ref()))));

        match outcome {
            Ok(returned) if entry.is_modified() => InvokeOutcome {
                new_value: entry.value,
                modified: true,
                computed: ProcessorResult::Value(returned),
            },
            Ok(returned) => InvokeOutcome {
                new_value: old_value.cloned(),
                modified: false,
                computed: ProcessorResult::Value(returned),
            },
            Err(err) => {
                tracing::debug!(
                    processor = processor.name(),
                    error = %err,
                    "entry processor failed; entry left unchanged"
                );
                InvokeOutcome {
                    new_value: old_value.cloned(),
                    modified: false,
                    computed: ProcessorResult::Failure(err),
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("processor panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("processor panicked: {}", s)
    } else {
        "processor panicked".to_string()
    }
}
