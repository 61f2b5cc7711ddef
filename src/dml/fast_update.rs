//! Fast-path arguments for single-row UPDATE and DELETE.
//!
//! Statements such as `UPDATE t SET _val = ? WHERE _key = ?` or
//! `DELETE FROM t WHERE _key = ? AND _val = ?` need no table scan: three
//! operands (key, expected value, new value) fully describe the write. Each
//! operand is either a planning-time constant or a positional statement
//! parameter, evaluated against the parameters supplied at execution time
//! and turned into an [`UpdateIntent`].

use crate::core::error::{TesseraError, TesseraResult};
use crate::update::intent::UpdateIntent;
use bytes::Bytes;

/// A SQL value as seen by the fast path; `None` is SQL NULL.
pub type SqlValue = Option<Bytes>;

/// One operand of a fast-path statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FastUpdateArgument<T = SqlValue> {
    /// Value fixed at planning time.
    Constant(T),
    /// Positional statement parameter (0-based).
    Parameter(usize),
}

impl<T> FastUpdateArgument<T> {
    /// Build a parameter operand, checking the index against the statement's
    /// parameter count at planning time.
    pub fn parameter(index: usize, param_count: usize) -> TesseraResult<Self> {
        if index >= param_count {
            return Err(TesseraError::parameter_out_of_range(index, param_count));
        }
        Ok(Self::Parameter(index))
    }

    /// Evaluate the operand against the execution-time parameters.
    pub fn apply<'a>(&'a self, params: &'a [T]) -> TesseraResult<&'a T> {
        match self {
            Self::Constant(value) => Ok(value),
            Self::Parameter(index) => params
                .get(*index)
                .ok_or_else(|| TesseraError::parameter_out_of_range(*index, params.len())),
        }
    }
}

/// Key, expected value and new value operands of a fast-path statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastUpdateArguments {
    pub key: FastUpdateArgument,
    /// Expected current value; NULL means unconditional.
    pub value: FastUpdateArgument,
    /// New value; NULL turns the statement into a delete.
    pub new_value: FastUpdateArgument,
}

impl FastUpdateArguments {
    pub fn new(
        key: FastUpdateArgument,
        value: FastUpdateArgument,
        new_value: FastUpdateArgument,
    ) -> Self {
        Self {
            key,
            value,
            new_value,
        }
    }

    /// Arguments for `DELETE ... WHERE _key = ? [AND _val = ?]`.
    pub fn delete(key: FastUpdateArgument, value: FastUpdateArgument) -> Self {
        Self::new(key, value, FastUpdateArgument::Constant(None))
    }

    /// Evaluate all three operands.
    pub fn evaluate(&self, params: &[SqlValue]) -> TesseraResult<FastUpdate> {
        let key = self.key.apply(params)?.clone().ok_or(TesseraError::NullKey)?;
        let expected = self.value.apply(params)?.clone();
        let new_value = self.new_value.apply(params)?.clone();

        Ok(FastUpdate {
            key,
            expected,
            new_value,
        })
    }

    /// Evaluate and build the update intent in one step.
    pub fn to_intent(&self, params: &[SqlValue]) -> TesseraResult<UpdateIntent> {
        Ok(self.evaluate(params)?.into_intent())
    }
}

/// A fully resolved single-row write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastUpdate {
    pub key: Bytes,
    pub expected: Option<Bytes>,
    pub new_value: Option<Bytes>,
}

impl FastUpdate {
    /// Replace when a new value is present, remove otherwise; conditional
    /// on the expected value when one is present.
    ///
    /// An UPDATE never inserts, so the put only applies to a row that exists.
    pub fn into_intent(self) -> UpdateIntent {
        let intent = match self.new_value {
            Some(value) => UpdateIntent::put(self.key, value).require_existing(),
            None => UpdateIntent::remove(self.key),
        };
        match self.expected {
            Some(expected) => intent.with_expected(expected),
            None => intent,
        }
    }
}
