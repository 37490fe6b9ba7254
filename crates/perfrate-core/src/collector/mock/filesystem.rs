//! In-memory mock filesystem for testing readers without real `/proc`.
//!
//! This module provides `MockFs` which simulates pseudo-files in memory,
//! allowing tests to run on macOS and in CI environments without Linux.
//! File contents are shared with every open handle, so a test can rewrite a
//! file between ticks and the next `reload()` sees the new counters.

use crate::collector::traits::{FileSystem, SourceFile};
use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type SharedContent = Arc<RwLock<String>>;

/// In-memory filesystem for testing.
///
/// Clones share file contents and open counters.
#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to shared file contents.
    files: HashMap<PathBuf, SharedContent>,
    /// Number of `open` calls per path.
    opens: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with the given content, or replaces the content of an
    /// existing file in place.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = path.as_ref();
        let content = content.into();
        match self.files.get(path) {
            Some(shared) => {
                *shared.write().unwrap_or_else(PoisonError::into_inner) = content;
            }
            None => {
                self.files
                    .insert(path.to_path_buf(), Arc::new(RwLock::new(content)));
            }
        }
    }

    /// Replaces the content of an existing file; handles opened earlier see
    /// the new content on their next read from offset zero.
    pub fn update_file(&self, path: impl AsRef<Path>, content: impl Into<String>) -> io::Result<()> {
        let shared = self.files.get(path.as_ref()).ok_or_else(|| not_found(path.as_ref()))?;
        *shared.write().unwrap_or_else(PoisonError::into_inner) = content.into();
        Ok(())
    }

    /// Number of times `path` has been opened.
    pub fn open_count(&self, path: impl AsRef<Path>) -> usize {
        self.opens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("file not found: {:?}", path),
    )
}

impl FileSystem for MockFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>> {
        let content = self.files.get(path).cloned().ok_or_else(|| not_found(path))?;

        *self
            .opens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        Ok(Box::new(MockFile::new(content)))
    }
}

/// Open handle into a `MockFs` file.
///
/// Takes a snapshot of the shared content on open and on every seek to
/// offset zero, mirroring how procfs regenerates a file per read pass.
#[derive(Debug)]
struct MockFile {
    content: SharedContent,
    snapshot: Vec<u8>,
    pos: u64,
}

impl MockFile {
    fn new(content: SharedContent) -> Self {
        let mut file = Self {
            content,
            snapshot: Vec::new(),
            pos: 0,
        };
        file.refresh();
        file
    }

    fn refresh(&mut self) {
        self.snapshot = self
            .content
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_bytes()
            .to_vec();
    }
}

impl Read for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = usize::try_from(self.pos)
            .unwrap_or(usize::MAX)
            .min(self.snapshot.len());
        let remaining = &self.snapshot[start..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MockFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => (self.snapshot.len() as u64).checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file")
        })?;

        if target == 0 {
            self.refresh();
        }
        self.pos = target;
        Ok(target)
    }
}
