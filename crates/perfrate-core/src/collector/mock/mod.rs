//! Mock filesystem implementations for testing.
//!
//! This module provides `MockFs` and pre-built scenarios for testing
//! readers without requiring actual Linux pseudo-file access.

mod filesystem;
mod scenarios;

pub use filesystem::MockFs;
pub use scenarios::{energy_fixture, meminfo_fixture, proc_stat_fixture};
