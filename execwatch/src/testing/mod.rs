//! Testing utilities for resilient monitoring.
//!
//! This module provides:
//! - A scripted gateway mock with per-endpoint call counters
//! - Record fixtures for common status sequences

mod fixtures;
mod mocks;

pub use fixtures::{
    record_sequence, running_record, success_record, waiting_record,
};
pub use mocks::ScriptedGateway;
