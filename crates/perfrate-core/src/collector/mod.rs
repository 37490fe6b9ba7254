//! Kernel counter readers for Linux.
//!
//! This module provides infrastructure for reading raw counters from the
//! `/proc` and `/sys` pseudo-filesystems, with support for mocking for
//! testing on macOS.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                   Reader (tagged by kind)                  │
//! │  ┌───────────────┐ ┌───────────────┐ ┌──────────────────┐  │
//! │  │ProcStatReader │ │ MemInfoReader │ │ BusEnergyReader  │  │
//! │  │ /proc/stat    │ │ /proc/meminfo │ │ /sys/bus/i2c/... │  │
//! │  └───────┬───────┘ └───────┬───────┘ └────────┬─────────┘  │
//! │          └─────────────────┼──────────────────┘            │
//! │                     ┌──────▼──────┐                        │
//! │                     │ PseudoFile  │ (seek to 0, re-read)   │
//! │                     └──────┬──────┘                        │
//! │                     ┌──────▼──────┐                        │
//! │                     │ FileSystem  │ (trait)                │
//! │                     └──────┬──────┘                        │
//! └────────────────────────────┼───────────────────────────────┘
//!                    ┌─────────┴─────────┐
//!             ┌──────▼──────┐     ┌──────▼──────┐
//!             │   RealFs    │     │   MockFs    │
//!             │  (Linux)    │     │  (Testing)  │
//!             └─────────────┘     └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::collections::BTreeSet;
//! use perfrate_core::collector::{MockFs, ProcStatReader, PseudoFile, Reader};
//!
//! let fs = MockFs::typical_system();
//! let mut file = PseudoFile::open(&fs, "/proc/stat").unwrap();
//! let reader = Reader::ProcStat(ProcStatReader::new(4));
//! let keys: BTreeSet<String> = ["user".to_string()].into();
//! let samples = reader.sample(&mut file, &keys).unwrap();
//! assert_eq!(samples.len(), 5);
//! ```

pub mod mock;
pub mod procfs;
pub mod reader;
pub mod sysfs;
pub mod traits;

pub use mock::MockFs;
pub use procfs::{MemInfoReader, ParseError, ProcStatReader};
pub use reader::{CollectError, RawSample, Reader, ReaderKind, SourceReader};
pub use sysfs::{BusEnergyReader, DEFAULT_ENERGY_PATH};
pub use traits::{FileSystem, PseudoFile, RealFs, SourceFile};
