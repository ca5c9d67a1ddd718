// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Refuses to replace an identity that already has history.

use crate::storage::{file_size, StoragePaths, StorageResult};

/// A log at least this large holds real history rather than an empty
/// placeholder. Kept literal for compatibility with existing installs.
pub const OVERWRITE_THRESHOLD_BYTES: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreDecision {
    /// One of the logs has content; restoring would orphan it.
    OverwriteRisk,
    /// Safe to write a new `secret` file.
    Proceed,
}

/// Decide whether a restore may write a new identity into `paths`.
///
/// Missing log files count as empty. Not atomic with the write that
/// follows; callers rely on being the only process on this root.
pub fn can_restore(paths: &StoragePaths) -> StorageResult<RestoreDecision> {
    for log in [paths.legacy_log(), paths.log()] {
        let size = file_size(&log)?;
        if size >= OVERWRITE_THRESHOLD_BYTES {
            tracing::info!(path = %log.display(), size, "existing log blocks restore");
            return Ok(RestoreDecision::OverwriteRisk);
        }
    }
    Ok(RestoreDecision::Proceed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, StoragePaths) {
        let temp = TempDir::new().unwrap();
        let paths = StoragePaths::new(temp.path());
        fs::create_dir_all(paths.legacy_log_dir()).unwrap();
        fs::create_dir_all(paths.log_dir()).unwrap();
        (temp, paths)
    }

    #[test]
    fn absent_logs_proceed() {
        let (_temp, paths) = setup();
        assert_eq!(can_restore(&paths).unwrap(), RestoreDecision::Proceed);
    }

    #[test]
    fn threshold_applies_to_both_logs() {
        for (size, expected) in [
            (0usize, RestoreDecision::Proceed),
            (9, RestoreDecision::Proceed),
            (10, RestoreDecision::OverwriteRisk),
            (1000, RestoreDecision::OverwriteRisk),
        ] {
            for which in ["legacy", "current"] {
                let (_temp, paths) = setup();
                let target = if which == "legacy" {
                    paths.legacy_log()
                } else {
                    paths.log()
                };
                fs::write(&target, vec![1u8; size]).unwrap();
                assert_eq!(
                    can_restore(&paths).unwrap(),
                    expected,
                    "{which} log of {size} bytes"
                );
            }
        }
    }

    #[test]
    fn small_files_in_both_logs_still_proceed() {
        let (_temp, paths) = setup();
        fs::write(paths.legacy_log(), [0u8; 9]).unwrap();
        fs::write(paths.log(), [0u8; 9]).unwrap();
        assert_eq!(can_restore(&paths).unwrap(), RestoreDecision::Proceed);
    }
}
