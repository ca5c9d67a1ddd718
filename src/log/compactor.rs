// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Removes duplicate records from the block log.
//!
//! Two live records with the same [`ShortKey`] are the same message written
//! twice. The first occurrence is the original write and stays; every later
//! one is deleted. Deletions start only after the whole log has been
//! scanned, so nothing is removed before it has been classified.

use std::collections::{BTreeSet, HashSet};
use std::path::Path;

use super::block_log::{AppendLog, DeleteOutcome};
use super::record::ShortKey;
use super::scanner::{LogScanner, ScanItem};
use super::LogResult;

/// Counts from one compaction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionReport {
    pub scanned: usize,
    pub corrupt: usize,
    pub deleted: usize,
    pub already_deleted: usize,
}

/// First-occurrence-wins duplicate detector.
#[derive(Debug, Default)]
pub struct DuplicateCompactor {
    seen: HashSet<ShortKey>,
    deletable: BTreeSet<u64>,
}

impl DuplicateCompactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one live record. Returns `true` if it duplicates an earlier
    /// one and has been marked for deletion.
    pub fn observe(&mut self, offset: u64, short_key: ShortKey) -> bool {
        if self.seen.insert(short_key) {
            false
        } else {
            self.deletable.insert(offset)
        }
    }

    pub fn deletable(&self) -> &BTreeSet<u64> {
        &self.deletable
    }

    /// Offsets to delete for a sequence of `(offset, short key)` pairs
    /// given in offset order.
    pub fn plan(records: impl IntoIterator<Item = (u64, ShortKey)>) -> BTreeSet<u64> {
        let mut compactor = Self::new();
        for (offset, short_key) in records {
            compactor.observe(offset, short_key);
        }
        std::mem::take(&mut compactor.deletable)
    }

    /// Scan the log at `path`, then delete every later duplicate.
    ///
    /// A missing log is left missing. Re-running over a compacted log
    /// deletes nothing.
    pub fn run(&mut self, path: &Path) -> LogResult<CompactionReport> {
        let mut report = CompactionReport::default();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no log to compact");
            return Ok(report);
        }

        for item in LogScanner::open(path)? {
            match item? {
                ScanItem::Record(record) => {
                    report.scanned += 1;
                    if let Some(short_key) = record.short_key {
                        if self.observe(record.offset, short_key) {
                            tracing::debug!(offset = record.offset, "duplicate record");
                        }
                    }
                }
                ScanItem::Corrupt { .. } => report.corrupt += 1,
            }
        }

        if !self.deletable.is_empty() {
            let mut log = AppendLog::open(path)?;
            for &offset in &self.deletable {
                match log.delete(offset)? {
                    DeleteOutcome::Deleted => report.deleted += 1,
                    DeleteOutcome::AlreadyDeleted | DeleteOutcome::NotFound => {
                        report.already_deleted += 1
                    }
                }
            }
            log.sync()?;
        }

        self.seen = HashSet::new();
        self.deletable = BTreeSet::new();

        tracing::info!(
            path = %path.display(),
            scanned = report.scanned,
            corrupt = report.corrupt,
            deleted = report.deleted,
            "duplicate compaction finished"
        );
        Ok(report)
    }
}
