// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # One-time fixes
//!
//! Repairs for on-disk damage left by older releases. Each fix is gated by
//! a zero-byte marker file `<root>/issue<N>`: if the marker exists the fix
//! has run and is skipped. The marker is written only after the fix body
//! succeeds, so a crash mid-fix means it runs again in full next start.
//! Every body is safe to repeat.
//!
//! The checklist runs in a fixed order because later fixes assume earlier
//! ones, e.g. indexes are cleared after compaction rewrote the log.

use crate::log::{DuplicateCompactor, LogError};
use crate::storage::{move_path, LocalStorage, MoveOutcome, StorageError, SECRET_FILE};

#[derive(Debug, thiserror::Error)]
pub enum FixError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// A named repair and its marker.
pub struct Fix {
    /// Marker file name under the storage root.
    pub marker: &'static str,
    pub description: &'static str,
    pub apply: fn(&LocalStorage) -> Result<(), FixError>,
}

impl std::fmt::Debug for Fix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fix")
            .field("marker", &self.marker)
            .field("description", &self.description)
            .finish()
    }
}

/// All fixes, in the order they must run.
pub fn all_fixes() -> Vec<Fix> {
    vec![
        Fix {
            marker: "issue1223",
            description: "Remove search index built with an old format",
            apply: remove_stale_search_index,
        },
        Fix {
            marker: "issue1280",
            description: "Remove stale prefix index files",
            apply: remove_prefix_indexes,
        },
        Fix {
            marker: "issue1486",
            description: "Turn a secret directory back into a file",
            apply: repair_secret_directory,
        },
        Fix {
            marker: "issue1328",
            description: "Delete duplicate records from the log",
            apply: compact_duplicates,
        },
        Fix {
            marker: "issue1331",
            description: "Rebuild indexes after compaction",
            apply: clear_indexes,
        },
    ]
}

/// Run the full checklist. Returns the markers of the fixes applied now.
pub fn run_fixes(storage: &LocalStorage) -> Result<Vec<&'static str>, FixError> {
    run_checklist(storage, &all_fixes())
}

/// Run `fixes` in order, skipping those whose marker exists.
pub fn run_checklist(
    storage: &LocalStorage,
    fixes: &[Fix],
) -> Result<Vec<&'static str>, FixError> {
    storage.initialize()?;

    let mut applied = Vec::new();
    for fix in fixes {
        let marker = storage.paths().fix_marker(fix.marker);
        if storage.exists(&marker) {
            tracing::debug!(fix = fix.marker, "already applied");
            continue;
        }

        tracing::info!(
            fix = fix.marker,
            description = fix.description,
            "applying fix"
        );
        (fix.apply)(storage)?;
        storage.touch(&marker)?;
        applied.push(fix.marker);
    }
    Ok(applied)
}

fn remove_stale_search_index(storage: &LocalStorage) -> Result<(), FixError> {
    storage.remove_dir(storage.paths().search_index_dir())?;
    Ok(())
}

fn remove_prefix_indexes(storage: &LocalStorage) -> Result<(), FixError> {
    for file in storage.list_files(storage.paths().jit_dir(), "32prefix")? {
        storage.remove_file(&file)?;
    }
    Ok(())
}

fn repair_secret_directory(storage: &LocalStorage) -> Result<(), FixError> {
    let secret = storage.paths().secret();
    let fixing = storage.paths().secret_fixing();

    if secret.is_dir() {
        tracing::warn!(path = %secret.display(), "secret is a directory");
        let inner = secret.join(SECRET_FILE);
        if inner.is_file() {
            move_path(&inner, &fixing)?;
        }
        storage.remove_dir(&secret)?;
    }

    if !secret.exists() && move_path(&fixing, &secret)? == MoveOutcome::Moved {
        tracing::info!(path = %secret.display(), "secret restored");
    }
    Ok(())
}

fn compact_duplicates(storage: &LocalStorage) -> Result<(), FixError> {
    DuplicateCompactor::new().run(&storage.paths().log())?;
    Ok(())
}

fn clear_indexes(storage: &LocalStorage) -> Result<(), FixError> {
    storage.remove_dir(storage.paths().indexes_dir())?;
    storage.remove_dir(storage.paths().jit_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{AppendLog, LogRecord, LogScanner};
    use crate::storage::StoragePaths;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStorage) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(StoragePaths::new(temp.path().join("ssb")));
        storage.initialize().unwrap();
        (temp, storage)
    }

    static MARKED_CALLS: AtomicUsize = AtomicUsize::new(0);
    static UNMARKED_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn count_marked(_: &LocalStorage) -> Result<(), FixError> {
        MARKED_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn count_unmarked(_: &LocalStorage) -> Result<(), FixError> {
        UNMARKED_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    #[test]
    fn marker_gates_each_fix() {
        let (_temp, storage) = setup();
        storage.touch(storage.paths().fix_marker("issue1")).unwrap();
        let fixes = [
            Fix {
                marker: "issue1",
                description: "spy",
                apply: count_marked,
            },
            Fix {
                marker: "issue2",
                description: "spy",
                apply: count_unmarked,
            },
        ];

        assert_eq!(run_checklist(&storage, &fixes).unwrap(), vec!["issue2"]);
        assert_eq!(run_checklist(&storage, &fixes).unwrap(), Vec::<&str>::new());

        assert_eq!(MARKED_CALLS.load(Ordering::SeqCst), 0);
        assert_eq!(UNMARKED_CALLS.load(Ordering::SeqCst), 1);
        let marker = storage.paths().fix_marker("issue2");
        assert!(storage.exists(&marker));
        assert_eq!(storage.file_size(marker).unwrap(), 0);
    }

    fn failing(_: &LocalStorage) -> Result<(), FixError> {
        Err(FixError::Log(LogError::EmptyRecord))
    }

    #[test]
    fn failed_fix_leaves_no_marker_and_stops() {
        let (_temp, storage) = setup();
        let fixes = [
            Fix {
                marker: "issue10",
                description: "fails",
                apply: failing,
            },
            Fix {
                marker: "issue11",
                description: "never reached",
                apply: clear_indexes,
            },
        ];

        assert!(run_checklist(&storage, &fixes).is_err());
        assert!(!storage.exists(storage.paths().fix_marker("issue10")));
        assert!(!storage.exists(storage.paths().fix_marker("issue11")));
    }

    #[test]
    fn full_checklist_runs_once_in_order() {
        let (_temp, storage) = setup();
        let applied = run_fixes(&storage).unwrap();
        assert_eq!(
            applied,
            vec!["issue1223", "issue1280", "issue1486", "issue1328", "issue1331"]
        );
        assert!(run_fixes(&storage).unwrap().is_empty());
        // No log existed, so none was created.
        assert!(!storage.paths().log().exists());
    }

    #[test]
    fn prefix_index_files_are_removed() {
        let (_temp, storage) = setup();
        let jit = storage.paths().jit_dir();
        fs::create_dir_all(&jit).unwrap();
        fs::write(jit.join("value_author.32prefix"), b"x").unwrap();
        fs::write(jit.join("seq.index"), b"x").unwrap();

        remove_prefix_indexes(&storage).unwrap();
        assert!(!jit.join("value_author.32prefix").exists());
        assert!(jit.join("seq.index").exists());
    }

    #[test]
    fn secret_directory_becomes_a_file() {
        let (_temp, storage) = setup();
        let secret = storage.paths().secret();
        fs::create_dir_all(&secret).unwrap();
        fs::write(secret.join(SECRET_FILE), b"{\"curve\":\"ed25519\"}").unwrap();

        repair_secret_directory(&storage).unwrap();
        assert!(secret.is_file());
        assert_eq!(fs::read(&secret).unwrap(), b"{\"curve\":\"ed25519\"}");
        assert!(!storage.paths().secret_fixing().exists());
    }

    #[test]
    fn interrupted_secret_repair_is_finished() {
        let (_temp, storage) = setup();
        fs::write(storage.paths().secret_fixing(), b"keys").unwrap();

        repair_secret_directory(&storage).unwrap();
        assert_eq!(fs::read(storage.paths().secret()).unwrap(), b"keys");
    }

    #[test]
    fn healthy_secret_is_untouched() {
        let (_temp, storage) = setup();
        fs::write(storage.paths().secret(), b"keys").unwrap();
        repair_secret_directory(&storage).unwrap();
        assert_eq!(fs::read(storage.paths().secret()).unwrap(), b"keys");
    }

    #[test]
    fn compaction_fix_then_index_reset() {
        let (_temp, storage) = setup();
        let mut log = AppendLog::open(storage.paths().log()).unwrap();
        let record = LogRecord {
            key: Some(format!("%{}=.sha256", "Q".repeat(43))),
            value: None,
            timestamp: Some(1.0),
        };
        log.append(&record.encode()).unwrap();
        log.append(&record.encode()).unwrap();
        drop(log);
        fs::create_dir_all(storage.paths().search_index_dir()).unwrap();

        run_fixes(&storage).unwrap();
        assert_eq!(LogScanner::open(storage.paths().log()).unwrap().count(), 1);
        assert!(!storage.paths().indexes_dir().exists());
    }
}
