//! perfrate-core: sampling and rate-derivation engine for kernel counters.
//!
//! Provides:
//! - `collector`: pseudo-file access (real and mock) and source readers
//!   for `/proc/stat`, `/proc/meminfo` and the system-bus energy monitor
//! - `rates`: per-topic sliding-window average rate of change
//! - `registry`: option catalog and command entry construction
//! - `sampler`: the fixed-interval sampling loop
//! - `sink`: print and publish outputs
//! - `table`: per-tick row buffering and CSV export
//! - `topic`: metric topic names

pub mod collector;
pub mod rates;
pub mod registry;
pub mod sampler;
pub mod sink;
pub mod table;
pub mod topic;
