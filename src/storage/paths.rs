// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the storage root layout.

use std::path::{Path, PathBuf};

/// File name of the identity keypair.
pub const SECRET_FILE: &str = "secret";

/// Files moved individually from the shared root during migration.
///
/// Each is optional in the source root.
pub const AUXILIARY_FILES: [&str; 4] =
    ["blobs_push", "conn.json", "conn-attempts.json", SECRET_FILE];

/// Storage path utilities for one storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    root: PathBuf,
}

impl StoragePaths {
    /// Create a new StoragePaths for the given root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Identity ==========

    /// Path to the identity keypair file.
    pub fn secret(&self) -> PathBuf {
        self.root.join(SECRET_FILE)
    }

    /// Scratch location used while repairing a `secret` directory.
    pub fn secret_fixing(&self) -> PathBuf {
        self.root.join("secret.fixing")
    }

    // ========== Legacy Log ==========

    /// Directory holding the legacy log.
    pub fn legacy_log_dir(&self) -> PathBuf {
        self.root.join("flume")
    }

    /// Path to the legacy-format log.
    pub fn legacy_log(&self) -> PathBuf {
        self.legacy_log_dir().join("log.offset")
    }

    // ========== Current Log ==========

    /// Directory holding the current-format log and its indexes.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("db2")
    }

    /// Path to the current-format log.
    pub fn log(&self) -> PathBuf {
        self.log_dir().join("log.bipf")
    }

    /// Staging file written while migrating into the current-format log.
    pub fn log_staging(&self) -> PathBuf {
        self.log_dir().join("log.bipf.migrating")
    }

    /// Directory of engine-maintained indexes.
    pub fn indexes_dir(&self) -> PathBuf {
        self.log_dir().join("indexes")
    }

    /// Directory of the full-text search index.
    pub fn search_index_dir(&self) -> PathBuf {
        self.indexes_dir().join("search")
    }

    /// Directory of just-in-time (prefix) indexes.
    pub fn jit_dir(&self) -> PathBuf {
        self.log_dir().join("jit")
    }

    // ========== Auxiliary ==========

    /// Directory of content-addressed blobs.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Path to an auxiliary file directly under the root.
    pub fn auxiliary(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    // ========== Fix Markers ==========

    /// Path to the sentinel file of a one-time fix.
    pub fn fix_marker(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}
