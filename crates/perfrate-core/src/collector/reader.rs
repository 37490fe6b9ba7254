//! Source reader interface shared by every pseudo-file kind.

use std::collections::BTreeSet;

use crate::collector::procfs::parser::ParseError;
use crate::collector::procfs::{MemInfoReader, ProcStatReader};
use crate::collector::sysfs::BusEnergyReader;
use crate::collector::traits::PseudoFile;
use crate::topic::MetricTopic;

/// One raw counter value read at one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSample {
    pub topic: MetricTopic,
    pub value: u64,
}

impl RawSample {
    pub fn new(topic: MetricTopic, value: u64) -> Self {
        Self { topic, value }
    }
}

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error re-reading the pseudo-file.
    Io(std::io::Error),
    /// Malformed or truncated counter line.
    Parse(ParseError),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CollectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CollectError::Io(e) => Some(e),
            CollectError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

impl From<ParseError> for CollectError {
    fn from(e: ParseError) -> Self {
        CollectError::Parse(e)
    }
}

/// Parses one read pass of a pseudo-file into raw samples.
pub trait SourceReader {
    /// Extracts one sample per requested key (and per scope, where the
    /// source has scopes) from `content`.
    fn parse(&self, content: &str, keys: &BTreeSet<String>) -> Result<Vec<RawSample>, ParseError>;
}

/// The kinds of pseudo-file this crate knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReaderKind {
    /// `/proc/stat`: CPU times, interrupts, context switches.
    ProcStat,
    /// `/proc/meminfo`: memory statistics.
    MemInfo,
    /// Power monitor attribute under `/sys/bus/i2c`.
    BusEnergy,
}

impl ReaderKind {
    pub const ALL: [ReaderKind; 3] = [ReaderKind::ProcStat, ReaderKind::MemInfo, ReaderKind::BusEnergy];

    /// Option group (`proc` in `proc:stat:user`).
    pub fn group(self) -> &'static str {
        match self {
            ReaderKind::ProcStat | ReaderKind::MemInfo => "proc",
            ReaderKind::BusEnergy => "sys",
        }
    }

    /// Option subgroup (`stat` in `proc:stat:user`).
    pub fn subgroup(self) -> &'static str {
        match self {
            ReaderKind::ProcStat => "stat",
            ReaderKind::MemInfo => "memstat",
            ReaderKind::BusEnergy => "bus",
        }
    }

    /// Resolves an option's (group, subgroup) pair.
    pub fn from_pair(group: &str, subgroup: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.group() == group && kind.subgroup() == subgroup)
    }

    /// Topic for an unscoped key of this source.
    pub fn topic(self, key: &str) -> MetricTopic {
        MetricTopic::new(self.group(), self.subgroup(), key)
    }

    /// Topic for a key below a scope (e.g. a CPU core) of this source.
    pub fn scoped_topic(self, scope: &str, key: &str) -> MetricTopic {
        MetricTopic::scoped(self.group(), self.subgroup(), scope, key)
    }
}

/// A configured reader, one variant per `ReaderKind`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reader {
    ProcStat(ProcStatReader),
    MemInfo(MemInfoReader),
    BusEnergy(BusEnergyReader),
}

impl Reader {
    pub fn kind(&self) -> ReaderKind {
        match self {
            Reader::ProcStat(_) => ReaderKind::ProcStat,
            Reader::MemInfo(_) => ReaderKind::MemInfo,
            Reader::BusEnergy(_) => ReaderKind::BusEnergy,
        }
    }

    /// Re-reads `file` from offset zero and parses it.
    pub fn sample(
        &self,
        file: &mut PseudoFile,
        keys: &BTreeSet<String>,
    ) -> Result<Vec<RawSample>, CollectError> {
        let content = file.reload()?;
        Ok(self.parse(content, keys)?)
    }
}

impl SourceReader for Reader {
    fn parse(&self, content: &str, keys: &BTreeSet<String>) -> Result<Vec<RawSample>, ParseError> {
        match self {
            Reader::ProcStat(reader) => reader.parse(content, keys),
            Reader::MemInfo(reader) => reader.parse(content, keys),
            Reader::BusEnergy(reader) => reader.parse(content, keys),
        }
    }
}
