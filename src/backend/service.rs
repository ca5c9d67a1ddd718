// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity lifecycle service.
//!
//! Owns the open log (if any) and answers identity commands. The open
//! engine is held here and handed out by reference, never stored globally.

use chrono::{DateTime, Utc};

use super::protocol::{IdentityCommand, IdentityReply, IdentityStatus};
use crate::config::AppConfig;
use crate::error::BackendError;
use crate::fixes::run_fixes;
use crate::identity::{self, Keypair, RestoreCode, SecretFile};
use crate::log::{AppendLog, LogResult};
use crate::migration::{self, Db2Migrator};
use crate::storage::{LocalStorage, StoragePaths};

/// The main storage engine as far as this crate is concerned: the
/// current log opened for writing, plus the identity that owns it.
#[derive(Debug)]
pub struct EngineHandle {
    log: AppendLog,
    keypair: Keypair,
    opened_at: DateTime<Utc>,
}

impl EngineHandle {
    pub fn open(paths: &StoragePaths, keypair: Keypair) -> LogResult<Self> {
        let log = AppendLog::open(paths.log())?;
        tracing::info!(
            id = %keypair.id(),
            end_offset = log.end_offset(),
            "engine opened"
        );
        Ok(Self {
            log,
            keypair,
            opened_at: Utc::now(),
        })
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    pub fn log(&mut self) -> &mut AppendLog {
        &mut self.log
    }

    pub fn close(self) -> LogResult<()> {
        self.log.sync()?;
        let open_for = Utc::now() - self.opened_at;
        tracing::info!(
            id = %self.keypair.id(),
            open_secs = open_for.num_seconds(),
            "engine closed"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Load {
    OrCreate,
    Existing,
}

/// Answers identity commands for one storage root.
#[derive(Debug)]
pub struct IdentityService {
    config: AppConfig,
    storage: LocalStorage,
    engine: Option<EngineHandle>,
}

impl IdentityService {
    pub fn new(config: AppConfig) -> Self {
        let storage = LocalStorage::new(StoragePaths::new(&config.ssb_dir));
        Self {
            config,
            storage,
            engine: None,
        }
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    pub fn engine(&self) -> Option<&EngineHandle> {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> Option<&mut EngineHandle> {
        self.engine.as_mut()
    }

    /// Handle one command, passing every reply to `emit`.
    ///
    /// Validation outcomes are replies. An `Err` is fatal.
    pub async fn handle<F>(
        &mut self,
        command: IdentityCommand,
        mut emit: F,
    ) -> Result<(), BackendError>
    where
        F: FnMut(IdentityReply),
    {
        tracing::debug!(?command, "identity command");
        match command {
            IdentityCommand::Create => {
                self.start(Load::OrCreate).await?;
                emit(IdentityReply::Status(IdentityStatus::Ready));
            }
            IdentityCommand::Use => {
                self.start(Load::Existing).await?;
                emit(IdentityReply::Status(IdentityStatus::Ready));
            }
            IdentityCommand::Restore(words) => {
                let code = self.restore(words).await?;
                emit(IdentityReply::Restore(code));
            }
            IdentityCommand::Migrate => {
                self.migrate(&mut emit).await?;
                emit(IdentityReply::Status(IdentityStatus::Ready));
            }
            IdentityCommand::Clear => {
                self.clear()?;
                emit(IdentityReply::Status(IdentityStatus::Cleared));
            }
        }
        Ok(())
    }

    /// Close the engine, if open.
    pub fn shutdown(&mut self) -> Result<(), BackendError> {
        if let Some(engine) = self.engine.take() {
            engine.close()?;
        }
        Ok(())
    }

    async fn start(&mut self, load: Load) -> Result<(), BackendError> {
        if self.engine.is_some() {
            return Ok(());
        }

        // Repairs must finish before anything opens the log.
        let storage = self.storage.clone();
        let applied = tokio::task::spawn_blocking(move || run_fixes(&storage)).await??;
        if !applied.is_empty() {
            tracing::info!(?applied, "one-time fixes applied");
        }

        let secret = SecretFile::new(&self.storage);
        let keypair = match load {
            Load::OrCreate => secret.load_or_create()?,
            Load::Existing => secret.load()?,
        };
        self.engine = Some(EngineHandle::open(self.storage.paths(), keypair)?);
        Ok(())
    }

    async fn restore(&mut self, words: String) -> Result<RestoreCode, BackendError> {
        let storage = self.storage.clone();
        let code =
            tokio::task::spawn_blocking(move || identity::restore(&storage, &words)).await??;
        if code != RestoreCode::IdentityReady {
            return Ok(code);
        }

        // A restore may replace the identity of an already open engine.
        self.shutdown()?;
        self.start(Load::Existing).await?;
        Ok(code)
    }

    async fn migrate<F>(&mut self, emit: &mut F) -> Result<(), BackendError>
    where
        F: FnMut(IdentityReply),
    {
        let roots = self.config.migration_roots()?;
        if roots.private != self.config.ssb_dir {
            tracing::warn!(
                private = %roots.private.display(),
                ssb_dir = %self.config.ssb_dir.display(),
                "migration target differs from the storage root"
            );
        }
        self.shutdown()?;

        let engine = Db2Migrator::new(StoragePaths::new(&roots.private));
        migration::migrate(
            roots,
            engine,
            |value| {
                emit(IdentityReply::Progress {
                    migration_progress: value,
                })
            },
            || tracing::debug!("engine migration complete"),
        )
        .await?;

        self.start(Load::OrCreate).await
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.shutdown()?;
        let root = self.storage.paths().root();
        if self.storage.remove_dir(root)? {
            tracing::info!(root = %root.display(), "storage root removed");
        }
        Ok(())
    }
}
