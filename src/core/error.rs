//! Error types.
//!
//! Suppressed writes (conflict `UseOld`, failed filters, no-op removes) and
//! entry processor failures are NOT errors: they are reported through
//! [`AtomicUpdateResult`](crate::update::coordinator::AtomicUpdateResult).
//! The variants below are the conditions that must never reach the update
//! coordinator at all.

use thiserror::Error;

/// Common Tessera error conditions.
#[derive(Debug, Error)]
pub enum TesseraError {
    /// The update intent has a shape that is invalid for its operation kind.
    #[error("invalid update intent: {reason}")]
    InvalidIntent { reason: String },

    /// A fast-path parameter argument referenced a missing statement parameter.
    ///
    /// Planning validates indexes up front, so seeing this at execution time
    /// means the planner produced a bad argument.
    #[error("fast update parameter index {index} out of range for {len} parameters")]
    ParameterOutOfRange { index: usize, len: usize },

    /// A fast-path key operand evaluated to SQL NULL.
    #[error("fast update key evaluated to NULL")]
    NullKey,

    /// Backup message encode/decode failure.
    #[error("codec error: {message}")]
    Codec { message: String },
}

impl TesseraError {
    /// Create an InvalidIntent error.
    pub fn invalid_intent(reason: impl Into<String>) -> Self {
        Self::InvalidIntent {
            reason: reason.into(),
        }
    }

    /// Create a ParameterOutOfRange error.
    pub fn parameter_out_of_range(index: usize, len: usize) -> Self {
        Self::ParameterOutOfRange { index, len }
    }

    /// Create a Codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Check if this error is a programmer/planning bug rather than a data condition.
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidIntent { .. } | Self::ParameterOutOfRange { .. } | Self::NullKey
        )
    }
}

impl From<bincode::Error> for TesseraError {
    fn from(err: bincode::Error) -> Self {
        Self::codec(err.to_string())
    }
}

/// Result type using TesseraError.
pub type TesseraResult<T> = Result<T, TesseraError>;
