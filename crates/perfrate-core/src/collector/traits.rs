//! Abstractions for pseudo-file access to enable testing and mocking.
//!
//! The `FileSystem` trait lets readers work against the real `/proc` and
//! `/sys` trees on Linux or against an in-memory mock in tests and on
//! other platforms.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A readable, seekable handle to a pseudo-file.
///
/// Kernel pseudo-files regenerate their content when read from offset
/// zero, so one handle can be re-read for every tick.
pub trait SourceFile: Read + Seek + Send {}

impl<T: Read + Seek + Send> SourceFile for T {}

/// Abstraction for filesystem operations.
pub trait FileSystem: Send + Sync {
    /// Opens `path` for repeated reading.
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>>;
}

/// Real filesystem implementation that delegates to `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFs;

impl RealFs {
    pub fn new() -> Self {
        Self
    }
}

impl FileSystem for RealFs {
    fn open(&self, path: &Path) -> io::Result<Box<dyn SourceFile>> {
        Ok(Box::new(File::open(path)?))
    }
}

/// An open pseudo-file, held for the whole run.
///
/// The handle is closed when the value is dropped.
pub struct PseudoFile {
    path: PathBuf,
    handle: Box<dyn SourceFile>,
    buf: String,
}

impl PseudoFile {
    /// Opens `path` through `fs`.
    pub fn open<F: FileSystem + ?Sized>(fs: &F, path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let handle = fs.open(&path)?;
        Ok(Self {
            path,
            handle,
            buf: String::new(),
        })
    }

    /// Seeks back to offset zero and reads the whole current content.
    pub fn reload(&mut self) -> io::Result<&str> {
        self.handle.seek(SeekFrom::Start(0))?;
        self.buf.clear();
        self.handle.read_to_string(&mut self.buf)?;
        Ok(&self.buf)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for PseudoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PseudoFile")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_real_fs_open_missing() {
        let fs = RealFs::new();
        let result = fs.open(Path::new("/nonexistent/path/12345"));
        assert_eq!(result.err().unwrap().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_pseudo_file_reload_sees_rewrites() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "first").unwrap();
        tmp.flush().unwrap();

        let mut file = PseudoFile::open(&RealFs::new(), tmp.path()).unwrap();
        assert_eq!(file.reload().unwrap(), "first\n");
        // Reading twice without changes yields the same content.
        assert_eq!(file.reload().unwrap(), "first\n");

        std::fs::write(tmp.path(), "second line\n").unwrap();
        assert_eq!(file.reload().unwrap(), "second line\n");
        assert_eq!(file.path(), tmp.path());
    }
}
