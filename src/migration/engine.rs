// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage engine seam and the built-in legacy log converter.

use std::fs;
use std::future::Future;
use std::io;

use tokio::task::JoinHandle;

use super::progress::{progress_channel, ProgressSender, ProgressSubscription, COMPLETE};
use super::MigrationError;
use crate::identity::Keypair;
use crate::log::{AppendLog, LegacyEntry, LegacyReader, LogError, LogRecord};
use crate::storage::{file_size, StorageError, StoragePaths};

/// Minimum progress change worth publishing.
const PROGRESS_STEP: f64 = 0.01;

/// A storage engine able to run its own log migration.
pub trait LogEngine {
    /// Start migrating and return the progress stream. A value of `1.0`
    /// means the migrated log is in place.
    fn start_migration(
        &mut self,
        keypair: &Keypair,
    ) -> Result<ProgressSubscription, MigrationError>;

    /// Release the engine, surfacing any failure of the migration itself.
    fn close(self) -> impl Future<Output = Result<(), MigrationError>> + Send;
}

/// Converts `flume/log.offset` into `db2/log.bipf` under one root.
///
/// Output goes to a staging file that is renamed into place at the end, so
/// an interrupted run leaves no half-written current log behind.
#[derive(Debug)]
pub struct Db2Migrator {
    paths: StoragePaths,
    task: Option<JoinHandle<Result<MigrationStats, MigrationError>>>,
}

/// Outcome of one conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationStats {
    pub migrated: u64,
    pub skipped: u64,
}

impl Db2Migrator {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths, task: None }
    }
}

impl LogEngine for Db2Migrator {
    fn start_migration(
        &mut self,
        keypair: &Keypair,
    ) -> Result<ProgressSubscription, MigrationError> {
        if self.task.is_some() {
            return Err(MigrationError::AlreadyStarted);
        }
        tracing::info!(
            id = %keypair.id(),
            root = %self.paths.root().display(),
            "starting log migration"
        );

        let (tx, subscription) = progress_channel();
        let paths = self.paths.clone();
        self.task = Some(tokio::task::spawn_blocking(move || {
            convert_legacy_log(&paths, &tx)
        }));
        Ok(subscription)
    }

    async fn close(self) -> Result<(), MigrationError> {
        let Some(task) = self.task else {
            return Ok(());
        };
        let stats = task.await??;
        tracing::info!(
            migrated = stats.migrated,
            skipped = stats.skipped,
            "log migration finished"
        );
        Ok(())
    }
}

/// Rewrite every legacy record into the current log format.
///
/// A non-empty current log, or no legacy log at all, means there is
/// nothing to do and completion is reported straight away.
pub fn convert_legacy_log(
    paths: &StoragePaths,
    progress: &ProgressSender,
) -> Result<MigrationStats, MigrationError> {
    let target = paths.log();
    let source = paths.legacy_log();
    let total = file_size(&source)?;
    if file_size(&target)? > 0 || total == 0 {
        tracing::debug!(root = %paths.root().display(), "no legacy log to convert");
        progress.send(COMPLETE);
        return Ok(MigrationStats::default());
    }

    let staging = paths.log_staging();
    match fs::remove_file(&staging) {
        Ok(()) => tracing::warn!(
            path = %staging.display(),
            "discarded staging log from an interrupted run"
        ),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(StorageError::io(&staging, e).into()),
    }

    let mut reader = LegacyReader::open(&source)?;
    let mut output = AppendLog::open(&staging)?;
    let mut stats = MigrationStats::default();
    let mut reported = 0.0;
    progress.send(0.0);

    while let Some(entry) = reader.next() {
        let rejected = match entry? {
            LegacyEntry::Record { offset, value } => match LogRecord::from_json(&value) {
                Ok(record) => match output.append(&record.encode()) {
                    Ok(_) => None,
                    Err(e @ LogError::RecordTooLarge { .. }) => Some((offset, e.to_string())),
                    Err(e) => return Err(e.into()),
                },
                Err(e) => Some((offset, e.to_string())),
            },
            LegacyEntry::Corrupt { offset, reason } => Some((offset, reason)),
        };
        match rejected {
            None => stats.migrated += 1,
            Some((offset, reason)) => {
                tracing::warn!(offset, %reason, "legacy record not migrated");
                stats.skipped += 1;
            }
        }

        let fraction = reader.position() as f64 / total as f64;
        if fraction < COMPLETE && fraction - reported >= PROGRESS_STEP {
            reported = fraction;
            progress.send(fraction);
        }
    }

    output.sync()?;
    drop(output);
    fs::rename(&staging, &target).map_err(|e| StorageError::io(&target, e))?;
    progress.send(COMPLETE);
    Ok(stats)
}
