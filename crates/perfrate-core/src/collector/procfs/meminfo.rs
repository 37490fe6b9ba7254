//! `/proc/meminfo` reader.

use std::collections::BTreeSet;

use crate::collector::procfs::parser::{ParseError, parse_meminfo_fields};
use crate::collector::reader::{RawSample, ReaderKind, SourceReader};

/// Option key → `/proc/meminfo` label.
pub const MEMINFO_LABELS: &[(&str, &str)] = &[
    ("total", "MemTotal"),
    ("free", "MemFree"),
    ("available", "MemAvailable"),
    ("buffers", "Buffers"),
    ("cached", "Cached"),
    ("swap_cached", "SwapCached"),
    ("active", "Active"),
    ("inactive", "Inactive"),
    ("active_anon", "Active(anon)"),
    ("inactive_anon", "Inactive(anon)"),
    ("active_file", "Active(file)"),
    ("inactive_file", "Inactive(file)"),
    ("swap_total", "SwapTotal"),
    ("swap_free", "SwapFree"),
    ("dirty", "Dirty"),
    ("writeback", "Writeback"),
    ("anon_pages", "AnonPages"),
    ("mapped", "Mapped"),
    ("shmem", "Shmem"),
    ("slab", "Slab"),
    ("s_reclaimable", "SReclaimable"),
    ("s_unreclaim", "SUnreclaim"),
    ("kernel_stack", "KernelStack"),
    ("page_tables", "PageTables"),
];

/// Returns the `/proc/meminfo` label of an option key.
pub fn meminfo_label(key: &str) -> Option<&'static str> {
    MEMINFO_LABELS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|&(_, label)| label)
}

/// Reader for `/proc/meminfo`. Values are reported in kB as the kernel
/// prints them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfoReader;

impl MemInfoReader {
    pub fn new() -> Self {
        Self
    }
}

impl SourceReader for MemInfoReader {
    fn parse(&self, content: &str, keys: &BTreeSet<String>) -> Result<Vec<RawSample>, ParseError> {
        let labels = keys
            .iter()
            .map(|key| {
                meminfo_label(key)
                    .ok_or_else(|| ParseError::new(format!("unknown meminfo key {}", key)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let values = parse_meminfo_fields(content, &labels)?;

        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, value)| RawSample::new(ReaderKind::MemInfo.topic(key), value))
            .collect())
    }
}
