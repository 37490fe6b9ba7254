//! Option catalog and command entry construction.
//!
//! Users select metrics with dotted options of the form
//! `group:subgroup:key` (e.g. `proc:stat:user`). The registry groups the
//! selection by source, opens each source file once, and yields one
//! `CommandEntry` per source with the set of requested keys.
//!
//! Options that do not have exactly three segments, or that name an unknown
//! source or key, are dropped without error.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::collector::reader::{CollectError, RawSample, Reader, ReaderKind};
use crate::collector::sysfs::DEFAULT_ENERGY_PATH;
use crate::collector::traits::{FileSystem, PseudoFile};
use crate::collector::{BusEnergyReader, MemInfoReader, ProcStatReader};

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub const PROC_STAT_OPTIONS: &[&str] = &[
    "proc:stat:user",
    "proc:stat:nice",
    "proc:stat:system",
    "proc:stat:idle",
    "proc:stat:iowait",
    "proc:stat:irq",
    "proc:stat:softirq",
    "proc:stat:steal",
    "proc:stat:intr",
    "proc:stat:ctxt",
];

pub const PROC_MEMSTAT_OPTIONS: &[&str] = &[
    "proc:memstat:total",
    "proc:memstat:free",
    "proc:memstat:available",
    "proc:memstat:buffers",
    "proc:memstat:cached",
    "proc:memstat:swap_cached",
    "proc:memstat:active",
    "proc:memstat:inactive",
    "proc:memstat:active_anon",
    "proc:memstat:inactive_anon",
    "proc:memstat:active_file",
    "proc:memstat:inactive_file",
    "proc:memstat:swap_total",
    "proc:memstat:swap_free",
    "proc:memstat:dirty",
    "proc:memstat:writeback",
    "proc:memstat:anon_pages",
    "proc:memstat:mapped",
    "proc:memstat:shmem",
    "proc:memstat:slab",
    "proc:memstat:s_reclaimable",
    "proc:memstat:s_unreclaim",
    "proc:memstat:kernel_stack",
    "proc:memstat:page_tables",
];

pub const SYS_BUS_OPTIONS: &[&str] = &["sys:bus:energy"];

/// Selectable options of one source.
#[derive(Debug, Clone, Copy)]
pub struct OptionGroup {
    pub kind: ReaderKind,
    /// Help heading for the group's flags.
    pub heading: &'static str,
    pub options: &'static [&'static str],
}

pub const OPTION_GROUPS: &[OptionGroup] = &[
    OptionGroup {
        kind: ReaderKind::ProcStat,
        heading: "/proc/stat",
        options: PROC_STAT_OPTIONS,
    },
    OptionGroup {
        kind: ReaderKind::BusEnergy,
        heading: "/sys/bus/i2c",
        options: SYS_BUS_OPTIONS,
    },
    OptionGroup {
        kind: ReaderKind::MemInfo,
        heading: "/proc/meminfo",
        options: PROC_MEMSTAT_OPTIONS,
    },
];

/// Every selectable option, grouped by source.
pub fn all_options() -> impl Iterator<Item = &'static str> {
    OPTION_GROUPS
        .iter()
        .flat_map(|group| group.options.iter().copied())
}

pub fn is_known_option(option: &str) -> bool {
    all_options().any(|known| known == option)
}

/// Splits `group:subgroup:key`; `None` unless there are exactly three
/// segments.
pub fn parse_option(option: &str) -> Option<(&str, &str, &str)> {
    let mut parts = option.split(':');
    let group = parts.next()?;
    let subgroup = parts.next()?;
    let key = parts.next()?;
    parts.next().is_none().then_some((group, subgroup, key))
}

// ---------------------------------------------------------------------------
// Source paths
// ---------------------------------------------------------------------------

/// Where each source kind is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePaths {
    /// Root of the proc filesystem (usually `/proc`).
    pub proc_root: PathBuf,
    /// Power monitor attribute for `sys:bus:energy`.
    pub energy: PathBuf,
}

impl Default for SourcePaths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            energy: PathBuf::from(DEFAULT_ENERGY_PATH),
        }
    }
}

impl SourcePaths {
    pub fn path(&self, kind: ReaderKind) -> PathBuf {
        match kind {
            ReaderKind::ProcStat => self.proc_root.join("stat"),
            ReaderKind::MemInfo => self.proc_root.join("meminfo"),
            ReaderKind::BusEnergy => self.energy.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Command entries
// ---------------------------------------------------------------------------

/// Error type for registry construction.
#[derive(Debug)]
pub enum RegistryError {
    /// A selected source could not be opened or read.
    Open { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::Open { path, source } => {
                write!(f, "cannot open {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Open { source, .. } => Some(source),
        }
    }
}

/// One active source: its reader, its open file and the requested keys.
///
/// The file stays open for the lifetime of the entry.
#[derive(Debug)]
pub struct CommandEntry {
    reader: Reader,
    file: PseudoFile,
    keys: BTreeSet<String>,
}

impl CommandEntry {
    pub fn new(reader: Reader, file: PseudoFile, keys: BTreeSet<String>) -> Self {
        Self { reader, file, keys }
    }

    pub fn kind(&self) -> ReaderKind {
        self.reader.kind()
    }

    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    pub fn keys(&self) -> &BTreeSet<String> {
        &self.keys
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Re-reads the source and returns this tick's raw samples.
    pub fn sample(&mut self) -> Result<Vec<RawSample>, CollectError> {
        self.reader.sample(&mut self.file, &self.keys)
    }
}

impl Drop for CommandEntry {
    fn drop(&mut self) {
        debug!("Closing {}", self.file.path().display());
    }
}

/// Builds one command entry per selected source.
///
/// Each source file is opened exactly once. Entries come out in
/// `ReaderKind` order. Failing to open a selected source is fatal; entries
/// opened before the failure are closed on return.
pub fn build_commands<F, I, S>(
    fs: &F,
    paths: &SourcePaths,
    options: I,
) -> Result<Vec<CommandEntry>, RegistryError>
where
    F: FileSystem + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut requested: BTreeMap<ReaderKind, BTreeSet<String>> = BTreeMap::new();

    for option in options {
        let option = option.as_ref();
        let Some((group, subgroup, key)) = parse_option(option) else {
            debug!("Ignoring malformed metric option {:?}", option);
            continue;
        };
        let Some(kind) = ReaderKind::from_pair(group, subgroup) else {
            debug!("Ignoring metric option {:?}: unknown source", option);
            continue;
        };
        if !is_known_option(option) {
            debug!("Ignoring metric option {:?}: unknown key", option);
            continue;
        }
        requested.entry(kind).or_default().insert(key.to_string());
    }

    let mut entries = Vec::with_capacity(requested.len());
    for (kind, keys) in requested {
        let path = paths.path(kind);
        let open_error = |source| RegistryError::Open {
            path: path.clone(),
            source,
        };

        let mut file = PseudoFile::open(fs, &path).map_err(open_error)?;
        let reader = match kind {
            ReaderKind::ProcStat => {
                let reader = ProcStatReader::detect(file.reload().map_err(open_error)?);
                info!("Detected {} CPU cores in {}", reader.cores(), path.display());
                Reader::ProcStat(reader)
            }
            ReaderKind::MemInfo => Reader::MemInfo(MemInfoReader::new()),
            ReaderKind::BusEnergy => Reader::BusEnergy(BusEnergyReader::new()),
        };

        info!(
            "Source {}:{} -> {} ({} keys)",
            kind.group(),
            kind.subgroup(),
            path.display(),
            keys.len()
        );
        entries.push(CommandEntry::new(reader, file, keys));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MockFs;

    fn build(fs: &MockFs, options: &[&str]) -> Vec<CommandEntry> {
        build_commands(fs, &SourcePaths::default(), options.iter().copied()).unwrap()
    }

    fn key_list(entry: &CommandEntry) -> Vec<&str> {
        entry.keys().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_parse_option() {
        assert_eq!(parse_option("proc:stat:user"), Some(("proc", "stat", "user")));
        assert_eq!(parse_option("proc:stat"), None);
        assert_eq!(parse_option("proc:stat:user:extra"), None);
        assert_eq!(parse_option("interval"), None);
        assert_eq!(parse_option("::"), Some(("", "", "")));
    }

    #[test]
    fn test_catalog_is_consistent() {
        assert_eq!(all_options().count(), 10 + 1 + 24);
        for option in all_options() {
            let (group, subgroup, _) = parse_option(option).unwrap();
            assert!(ReaderKind::from_pair(group, subgroup).is_some(), "{}", option);
        }
        assert!(is_known_option("proc:memstat:page_tables"));
        assert!(!is_known_option("proc:memstat:hugepages"));
    }

    #[test]
    fn test_same_source_is_deduplicated() {
        let fs = MockFs::typical_system();
        let entries = build(&fs, &["proc:stat:user", "proc:stat:nice", "proc:stat:user"]);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind(), ReaderKind::ProcStat);
        assert_eq!(key_list(&entries[0]), vec!["nice", "user"]);
        assert_eq!(entries[0].path(), Path::new("/proc/stat"));
        assert_eq!(fs.open_count("/proc/stat"), 1);
    }

    #[test]
    fn test_core_count_detected_on_open() {
        let fs = MockFs::with_cores(6);
        let entries = build(&fs, &["proc:stat:idle"]);
        assert_eq!(entries[0].reader(), &Reader::ProcStat(ProcStatReader::new(6)));
    }

    #[test]
    fn test_unknown_option_is_inert() {
        let fs = MockFs::typical_system();
        let entries = build(&fs, &["foo:bar:baz"]);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_malformed_and_unknown_keys_dropped() {
        let fs = MockFs::typical_system();
        let entries = build(
            &fs,
            &[
                "proc:stat",
                "proc:stat:user:x",
                "proc:stat:guest",
                "sys:bus:voltage",
                "debug",
                "sys:bus:energy",
            ],
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind(), ReaderKind::BusEnergy);
        assert_eq!(fs.open_count("/proc/stat"), 0);
    }

    #[test]
    fn test_entries_in_kind_order() {
        let fs = MockFs::typical_system();
        let entries = build(
            &fs,
            &["sys:bus:energy", "proc:memstat:free", "proc:stat:ctxt", "proc:memstat:dirty"],
        );
        let kinds: Vec<ReaderKind> = entries.iter().map(CommandEntry::kind).collect();
        assert_eq!(
            kinds,
            vec![ReaderKind::ProcStat, ReaderKind::MemInfo, ReaderKind::BusEnergy]
        );
        assert_eq!(key_list(&entries[1]), vec!["dirty", "free"]);
        assert_eq!(entries[1].path(), Path::new("/proc/meminfo"));
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/stat", "cpu  1 2 3 4 5 6 7 8 0 0\n");

        let result = build_commands(
            &fs,
            &SourcePaths::default(),
            ["proc:stat:user", "sys:bus:energy"],
        );
        match result {
            Err(RegistryError::Open { path, source }) => {
                assert_eq!(path, PathBuf::from(DEFAULT_ENERGY_PATH));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected open error, got {:?}", other.map(|e| e.len())),
        }
    }

    #[test]
    fn test_custom_proc_root() {
        let mut fs = MockFs::new();
        fs.add_file("/host/proc/meminfo", crate::collector::mock::meminfo_fixture(0));
        let paths = SourcePaths {
            proc_root: PathBuf::from("/host/proc"),
            ..SourcePaths::default()
        };

        let mut entries = build_commands(&fs, &paths, ["proc:memstat:total"]).unwrap();
        let samples = entries[0].sample().unwrap();
        assert_eq!(samples[0].value, 16_384_000);
    }

    #[test]
    fn test_empty_selection() {
        let fs = MockFs::new();
        let entries = build_commands(&fs, &SourcePaths::default(), Vec::<String>::new()).unwrap();
        assert!(entries.is_empty());
    }
}
