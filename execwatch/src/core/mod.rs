//! Core execution model.
//!
//! This module provides:
//! - Execution status enum with terminal classification
//! - Immutable execution record snapshots

mod record;
mod status;

pub use record::ExecutionRecord;
pub use status::ExecutionStatus;
