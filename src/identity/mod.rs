// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity
//!
//! One ed25519 keypair per storage root, kept in the `secret` file. It is
//! created once (fresh, restored from a phrase, or carried over by a
//! migration) and never replaced implicitly: a restore first checks that
//! neither log holds history.

pub mod guard;
pub mod keys;
pub mod mnemonic;
pub mod restore;

pub use guard::{can_restore, RestoreDecision, OVERWRITE_THRESHOLD_BYTES};
pub use keys::{Keypair, KeypairFile, SecretFile};
pub use mnemonic::{derive_keypair, words_to_keys, DeriveError, MnemonicError, PhraseRejection};
pub use restore::{restore, RestoreCode};

use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("secret file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid secret file: {0}")]
    InvalidKeyFile(String),

    #[error("key derivation failed: {0}")]
    Mnemonic(#[from] MnemonicError),
}
