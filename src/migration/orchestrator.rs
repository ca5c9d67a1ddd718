// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Moves a desktop install from the shared root into the app-private root
//! and drives the log engine's migration to completion.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::engine::LogEngine;
use super::progress::{is_complete, ProgressGauge};
use super::MigrationError;
use crate::config::MigrationRoots;
use crate::identity::SecretFile;
use crate::storage::{
    ensure_dir, move_path, remove_dir_if_exists, LocalStorage, MoveOutcome, StoragePaths,
    AUXILIARY_FILES,
};

/// One migration attempt. Discarded once it finishes.
#[derive(Debug, Clone)]
pub struct MigrationSession {
    id: Uuid,
    started_at: DateTime<Utc>,
    roots: MigrationRoots,
}

impl MigrationSession {
    pub fn new(roots: MigrationRoots) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            roots,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn roots(&self) -> &MigrationRoots {
        &self.roots
    }

    /// Run every step in order, relaying progress until the engine reports
    /// completion. `on_complete` runs after the engine has been closed.
    pub async fn run<E, P, C>(
        self,
        mut engine: E,
        mut on_progress: P,
        on_complete: C,
    ) -> Result<(), MigrationError>
    where
        E: LogEngine,
        P: FnMut(f64),
        C: FnOnce(),
    {
        tracing::info!(
            session = %self.id,
            shared = %self.roots.shared.display(),
            private = %self.roots.private.display(),
            "migration started"
        );

        let roots = self.roots.clone();
        tokio::task::spawn_blocking(move || relocate(&roots)).await??;

        let storage = LocalStorage::new(StoragePaths::new(&self.roots.private));
        let keypair = SecretFile::new(&storage).load_or_create()?;
        let mut subscription = engine.start_migration(&keypair)?;

        let mut gauge = ProgressGauge::new();
        loop {
            let Some(raw) = subscription.recv().await else {
                subscription.unsubscribe();
                engine.close().await?;
                return Err(MigrationError::Incomplete(gauge.last()));
            };
            let Some(value) = gauge.observe(raw) else {
                continue;
            };
            on_progress(value);
            if is_complete(value) {
                break;
            }
        }

        subscription.unsubscribe();
        engine.close().await?;

        let elapsed = Utc::now() - self.started_at;
        tracing::info!(
            session = %self.id,
            elapsed_ms = elapsed.num_milliseconds(),
            "migration complete"
        );
        on_complete();
        Ok(())
    }
}

/// Start a [`MigrationSession`] over `roots` and run it.
pub async fn migrate<E, P, C>(
    roots: MigrationRoots,
    engine: E,
    on_progress: P,
    on_complete: C,
) -> Result<(), MigrationError>
where
    E: LogEngine,
    P: FnMut(f64),
    C: FnOnce(),
{
    MigrationSession::new(roots)
        .run(engine, on_progress, on_complete)
        .await
}

/// Move the shared root's content into the private root, then delete the
/// shared root. Each step finishes before the next starts.
pub fn relocate(roots: &MigrationRoots) -> Result<(), MigrationError> {
    let shared = StoragePaths::new(&roots.shared);
    let private = StoragePaths::new(&roots.private);

    ensure_dir(private.root())?;

    if move_path(&shared.blobs_dir(), &private.blobs_dir())? == MoveOutcome::SourceMissing {
        tracing::warn!(path = %shared.blobs_dir().display(), "no blobs to move");
    }

    ensure_dir(&private.legacy_log_dir())?;
    let legacy_log = shared.legacy_log();
    if move_path(&legacy_log, &private.legacy_log())? == MoveOutcome::SourceMissing {
        return Err(MigrationError::MissingLegacyLog(legacy_log));
    }

    for name in AUXILIARY_FILES {
        if move_path(&shared.auxiliary(name), &private.auxiliary(name))?
            == MoveOutcome::SourceMissing
        {
            tracing::debug!(file = name, "auxiliary file absent, skipped");
        }
    }

    remove_dir_if_exists(shared.root())?;
    tracing::info!(private = %private.root().display(), "files relocated");
    Ok(())
}
