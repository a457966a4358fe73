//! File source collaborator: opening, sizing, and reading encoded audio.
//!
//! A handle is closed when it is dropped.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// An open, readable audio file.
pub trait MediaFile: Read + Send {
    /// Total size in bytes as reported when the file was opened.
    fn size(&self) -> u64;
}

/// Where audio files live.
pub trait Storage: Send + Sync {
    type File: MediaFile;

    fn open(&self, path: &Path) -> io::Result<Self::File>;
}

/// Storage backed by the local filesystem, optionally rooted at a mount point.
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    root: Option<PathBuf>,
}

impl FsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root` (e.g. a flash partition mount).
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

pub struct FsFile {
    file: File,
    size: u64,
}

impl Read for FsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl MediaFile for FsFile {
    fn size(&self) -> u64 {
        self.size
    }
}

impl Storage for FsStorage {
    type File = FsFile;

    fn open(&self, path: &Path) -> io::Result<FsFile> {
        let path = self.resolve(path);
        let file = File::open(&path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        log::debug!("Opened {} ({} bytes)", path.display(), meta.len());
        Ok(FsFile {
            file,
            size: meta.len(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_fs_storage_reports_size() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&[1u8; 300]).unwrap();

        let storage = FsStorage::new();
        let mut file = storage.open(tmp.path()).unwrap();
        assert_eq!(file.size(), 300);

        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        assert_eq!(content.len(), 300);
    }

    #[test]
    fn test_fs_storage_rooted_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chime.mp3"), b"abc").unwrap();

        let storage = FsStorage::rooted(dir.path());
        let file = storage.open(Path::new("chime.mp3")).unwrap();
        assert_eq!(file.size(), 3);
    }

    #[test]
    fn test_fs_storage_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::rooted(dir.path());
        let err = storage.open(Path::new("missing.mp3")).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_storage_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsStorage::new();
        assert!(storage.open(dir.path()).is_err());
    }
}
