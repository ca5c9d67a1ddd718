// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Desktop migration
//!
//! Older desktop installs kept their data in a root shared with other
//! clients. Migration moves it into the app-private root and converts the
//! legacy log:
//!
//! 1. create the private root
//! 2. move `blobs/` (may be absent)
//! 3. move `flume/log.offset` (required)
//! 4. move the auxiliary files (each may be absent)
//! 5. delete the shared root
//! 6. load the identity and start the engine's migration
//! 7. relay progress until it reaches `1.0`, then close the engine
//!
//! None of this is resumable. A failure is fatal and the operator re-runs
//! it; every step tolerates having already been done.

pub mod engine;
pub mod orchestrator;
pub mod progress;

pub use engine::{convert_legacy_log, Db2Migrator, LogEngine, MigrationStats};
pub use orchestrator::{migrate, relocate, MigrationSession};
pub use progress::{
    is_complete, progress_channel, ProgressGauge, ProgressSender, ProgressSubscription, COMPLETE,
};

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::identity::IdentityError;
use crate::log::LogError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("legacy log not found at {0}")]
    MissingLegacyLog(PathBuf),

    #[error("engine migration already started")]
    AlreadyStarted,

    #[error("engine stopped reporting before completion (last progress {0})")]
    Incomplete(f64),

    #[error("migration task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
