// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fatal errors of the identity backend.
//!
//! Anything that reaches this type stops the process: the backend has no
//! safe way to carry on with half-applied state. Expected outcomes such as
//! a mistyped recovery phrase are replies, not errors.

use crate::config::ConfigError;
use crate::fixes::FixError;
use crate::identity::IdentityError;
use crate::log::LogError;
use crate::migration::MigrationError;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error("migration failed: {0}")]
    Migration(#[from] MigrationError),

    #[error("one-time fix failed: {0}")]
    Fix(#[from] FixError),

    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("reply serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
