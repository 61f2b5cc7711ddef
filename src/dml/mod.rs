//! DML fast path.
//!
//! - [`fast_update`] - Query-less single-row UPDATE/DELETE operands

pub mod fast_update;
