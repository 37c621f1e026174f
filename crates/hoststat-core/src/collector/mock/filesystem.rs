//! In-memory mock filesystem for testing the sampler without real `/proc`.
//!
//! Each path holds a sequence of contents. Successive reads walk the
//! sequence and keep returning the last entry once it is exhausted, which
//! lets a test describe counters before and after the measurement window.

use crate::collector::traits::FileSystem;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct MockFs {
    /// Map from path to successive file contents.
    files: HashMap<PathBuf, Vec<String>>,
    /// Number of reads served per path, shared between clones.
    reads: Arc<Mutex<HashMap<PathBuf, usize>>>,
}

impl MockFs {
    /// Creates a new empty mock filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file whose content never changes.
    pub fn add_file(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        self.files
            .insert(path.as_ref().to_path_buf(), vec![content.into()]);
    }

    /// Adds a file whose content changes on every read.
    pub fn add_file_sequence<I, S>(&mut self, path: impl AsRef<Path>, contents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let contents: Vec<String> = contents.into_iter().map(Into::into).collect();
        if contents.is_empty() {
            return;
        }
        self.files.insert(path.as_ref().to_path_buf(), contents);
    }

    /// Removes a file so later reads fail with `NotFound`.
    pub fn remove_file(&mut self, path: impl AsRef<Path>) {
        self.files.remove(path.as_ref());
    }

    /// Number of reads served for `path` so far.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }
}

impl FileSystem for MockFs {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let contents = self.files.get(path).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("file not found: {:?}", path),
            )
        })?;

        let mut reads = self.reads.lock().unwrap_or_else(PoisonError::into_inner);
        let served = reads.entry(path.to_path_buf()).or_insert(0);
        let idx = (*served).min(contents.len() - 1);
        *served += 1;
        Ok(contents[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fs_add_file() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/meminfo", "MemTotal: 16384 kB\n");

        let content = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(content, "MemTotal: 16384 kB\n");
        let again = fs.read_to_string(Path::new("/proc/meminfo")).unwrap();
        assert_eq!(again, content);
    }

    #[test]
    fn test_mock_fs_sequence_sticks_at_last() {
        let mut fs = MockFs::new();
        fs.add_file_sequence("/proc/stat", ["first", "second"]);

        let path = Path::new("/proc/stat");
        assert_eq!(fs.read_to_string(path).unwrap(), "first");
        assert_eq!(fs.read_to_string(path).unwrap(), "second");
        assert_eq!(fs.read_to_string(path).unwrap(), "second");
        assert_eq!(fs.read_count(path), 3);
    }

    #[test]
    fn test_mock_fs_clones_share_read_position() {
        let mut fs = MockFs::new();
        fs.add_file_sequence("/proc/stat", ["a", "b"]);
        let clone = fs.clone();

        assert_eq!(fs.read_to_string(Path::new("/proc/stat")).unwrap(), "a");
        assert_eq!(clone.read_to_string(Path::new("/proc/stat")).unwrap(), "b");
    }

    #[test]
    fn test_mock_fs_not_found() {
        let mut fs = MockFs::new();
        fs.add_file("/proc/diskstats", "");
        fs.remove_file("/proc/diskstats");
        let result = fs.read_to_string(Path::new("/proc/diskstats"));
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::NotFound);
    }
}
