//! Core infrastructure.
//!
//! - [`config`] - Configuration parsing and validation
//! - [`time`] - Clock sources for expiry and tombstone deadlines
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod time;
