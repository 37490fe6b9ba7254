//! Readers for Linux `/proc` pseudo-files.
//!
//! `parser` holds the pure string parsers; `stat` and `meminfo` turn their
//! output into raw samples.

pub mod meminfo;
pub mod parser;
pub mod stat;

pub use meminfo::MemInfoReader;
pub use parser::ParseError;
pub use stat::ProcStatReader;
