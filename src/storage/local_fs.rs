// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem operations over a storage root.
//!
//! Every helper here is safe to repeat: removing something already gone,
//! creating a directory that exists, or moving a source that was already
//! moved are reported as outcomes rather than errors where the callers
//! need that. Anything else surfaces as [`StorageError::Io`] with the path
//! that failed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::StoragePaths;

/// Error type for storage root operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("expected a file but found a directory: {0}")]
    UnexpectedDirectory(PathBuf),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// What a tolerant move actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    SourceMissing,
}

/// Storage root handle with path-aware filesystem helpers.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    paths: StoragePaths,
}

impl LocalStorage {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the root directory if needed. Idempotent.
    pub fn initialize(&self) -> StorageResult<()> {
        ensure_dir(self.paths.root())
    }

    /// Byte size of a file, `0` when it does not exist.
    pub fn file_size(&self, path: impl AsRef<Path>) -> StorageResult<u64> {
        file_size(path.as_ref())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        path.as_ref().exists()
    }

    /// Create a zero-byte file, leaving an existing one untouched.
    pub fn touch(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }

    /// Remove a directory tree. Returns `false` if it was already absent.
    pub fn remove_dir(&self, path: impl AsRef<Path>) -> StorageResult<bool> {
        remove_dir_if_exists(path.as_ref())
    }

    /// Remove a file. Returns `false` if it was already absent.
    pub fn remove_file(&self, path: impl AsRef<Path>) -> StorageResult<bool> {
        let path = path.as_ref();
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    /// List files in `dir` whose name ends with `.{extension}`.
    ///
    /// A missing directory yields an empty list.
    pub fn list_files(
        &self,
        dir: impl AsRef<Path>,
        extension: &str,
    ) -> StorageResult<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(dir, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Read a whole file.
    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| StorageError::io(path, e))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| StorageError::io(path, e))?;
        Ok(data)
    }

    /// Write a file that only its owner may read (mode 0o400 on unix).
    ///
    /// Any existing regular file at `path` is replaced.
    pub fn write_private(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        let path = path.as_ref();
        if path.is_dir() {
            return Err(StorageError::UnexpectedDirectory(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        // A read-only file cannot be reopened for writing.
        self.remove_file(path)?;

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o400);
        }
        let mut file = options.open(path).map_err(|e| StorageError::io(path, e))?;
        file.write_all(data).map_err(|e| StorageError::io(path, e))?;
        file.sync_all().map_err(|e| StorageError::io(path, e))?;
        Ok(())
    }
}

/// Byte size of a file, `0` when it does not exist.
pub fn file_size(path: &Path) -> StorageResult<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Create a directory and its parents. Idempotent.
pub fn ensure_dir(path: &Path) -> StorageResult<()> {
    fs::create_dir_all(path).map_err(|e| StorageError::io(path, e))
}

/// Remove a directory tree. Returns `false` if it was already absent.
pub fn remove_dir_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Move a file or directory, falling back to copy + remove across devices.
///
/// A missing source is reported as [`MoveOutcome::SourceMissing`]; whether
/// that is acceptable is the caller's decision.
pub fn move_path(from: &Path, to: &Path) -> StorageResult<MoveOutcome> {
    match fs::rename(from, to) {
        Ok(()) => Ok(MoveOutcome::Moved),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !from.exists() => {
            Ok(MoveOutcome::SourceMissing)
        }
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                "rename crosses devices, copying instead"
            );
            copy_recursive(from, to)?;
            if from.is_dir() {
                fs::remove_dir_all(from).map_err(|e| StorageError::io(from, e))?;
            } else {
                fs::remove_file(from).map_err(|e| StorageError::io(from, e))?;
            }
            Ok(MoveOutcome::Moved)
        }
        Err(e) => Err(StorageError::io(from, e)),
    }
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

fn copy_recursive(from: &Path, to: &Path) -> StorageResult<()> {
    if from.is_dir() {
        ensure_dir(to)?;
        for entry in fs::read_dir(from).map_err(|e| StorageError::io(from, e))? {
            let entry = entry.map_err(|e| StorageError::io(from, e))?;
            copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        fs::copy(from, to).map_err(|e| StorageError::io(from, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStorage) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(StoragePaths::new(temp.path().join("root")));
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn initialize_is_idempotent() {
        let (_temp, storage) = setup();
        storage.initialize().unwrap();
        assert!(storage.paths().root().is_dir());
    }

    #[test]
    fn file_size_of_missing_file_is_zero() {
        let (_temp, storage) = setup();
        assert_eq!(storage.file_size(storage.paths().log()).unwrap(), 0);

        fs::create_dir_all(storage.paths().log_dir()).unwrap();
        fs::write(storage.paths().log(), [7u8; 42]).unwrap();
        assert_eq!(storage.file_size(storage.paths().log()).unwrap(), 42);
    }

    #[test]
    fn touch_creates_empty_marker_and_keeps_existing() {
        let (_temp, storage) = setup();
        let marker = storage.paths().fix_marker("issue1");
        storage.touch(&marker).unwrap();
        assert_eq!(fs::metadata(&marker).unwrap().len(), 0);

        fs::write(&marker, b"keep").unwrap();
        storage.touch(&marker).unwrap();
        assert_eq!(fs::read(&marker).unwrap(), b"keep");
    }

    #[test]
    fn removals_tolerate_absence() {
        let (_temp, storage) = setup();
        let dir = storage.paths().indexes_dir();
        fs::create_dir_all(dir.join("nested")).unwrap();

        assert!(storage.remove_dir(&dir).unwrap());
        assert!(!storage.remove_dir(&dir).unwrap());
        assert!(!storage.remove_file(storage.paths().secret()).unwrap());
    }

    #[test]
    fn list_files_filters_by_extension() {
        let (_temp, storage) = setup();
        let jit = storage.paths().jit_dir();
        fs::create_dir_all(&jit).unwrap();
        fs::write(jit.join("a.32prefix"), b"").unwrap();
        fs::write(jit.join("b.32prefix"), b"").unwrap();
        fs::write(jit.join("c.index"), b"").unwrap();

        let files = storage.list_files(&jit, "32prefix").unwrap();
        assert_eq!(files, vec![jit.join("a.32prefix"), jit.join("b.32prefix")]);
        assert!(storage
            .list_files(storage.paths().root().join("nope"), "x")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn write_private_replaces_existing_file() {
        let (_temp, storage) = setup();
        let secret = storage.paths().secret();
        storage.write_private(&secret, b"first").unwrap();
        storage.write_private(&secret, b"second").unwrap();
        assert_eq!(storage.read_raw(&secret).unwrap(), b"second");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&secret).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o400);
        }
    }

    #[test]
    fn write_private_refuses_directories() {
        let (_temp, storage) = setup();
        fs::create_dir_all(storage.paths().secret()).unwrap();
        let err = storage
            .write_private(storage.paths().secret(), b"x")
            .unwrap_err();
        assert!(matches!(err, StorageError::UnexpectedDirectory(_)));
    }

    #[test]
    fn move_path_reports_missing_source() {
        let temp = TempDir::new().unwrap();
        let outcome = move_path(&temp.path().join("absent"), &temp.path().join("dest")).unwrap();
        assert_eq!(outcome, MoveOutcome::SourceMissing);
    }

    #[test]
    fn move_path_moves_directories() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("blobs");
        fs::create_dir_all(from.join("sha256")).unwrap();
        fs::write(from.join("sha256").join("ab"), b"blob").unwrap();

        let to = temp.path().join("elsewhere");
        assert_eq!(move_path(&from, &to).unwrap(), MoveOutcome::Moved);
        assert!(!from.exists());
        assert_eq!(fs::read(to.join("sha256").join("ab")).unwrap(), b"blob");
    }
}
