// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Restoring an identity from a recovery phrase.

use serde::{Deserialize, Serialize};

use super::{
    can_restore, derive_keypair, DeriveError, IdentityError, PhraseRejection, RestoreDecision,
    SecretFile,
};
use crate::storage::LocalStorage;

/// Answer to a restore request. Every variant is a normal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreCode {
    IdentityReady,
    OverwriteRisk,
    TooShort,
    TooLong,
    Incorrect,
    WrongLength,
}

impl From<PhraseRejection> for RestoreCode {
    fn from(rejection: PhraseRejection) -> Self {
        match rejection {
            PhraseRejection::TooShort => RestoreCode::TooShort,
            PhraseRejection::TooLong => RestoreCode::TooLong,
            PhraseRejection::Incorrect => RestoreCode::Incorrect,
            PhraseRejection::WrongLength => RestoreCode::WrongLength,
        }
    }
}

/// Replace the identity of `storage` with the one encoded by `words`.
///
/// The guard runs before the phrase is even looked at, so a mature
/// identity is reported as [`RestoreCode::OverwriteRisk`] regardless of
/// what was typed.
pub fn restore(storage: &LocalStorage, words: &str) -> Result<RestoreCode, IdentityError> {
    storage.initialize()?;

    if can_restore(storage.paths())? == RestoreDecision::OverwriteRisk {
        return Ok(RestoreCode::OverwriteRisk);
    }

    let keypair = match derive_keypair(words) {
        Ok(keypair) => keypair,
        Err(DeriveError::Rejected(rejection)) => {
            tracing::debug!(%rejection, "recovery phrase rejected");
            return Ok(rejection.into());
        }
        Err(DeriveError::Primitive(e)) => return Err(e.into()),
    };

    SecretFile::new(storage).overwrite(&keypair)?;
    Ok(RestoreCode::IdentityReady)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;
    use crate::storage::StoragePaths;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStorage) {
        let temp = TempDir::new().unwrap();
        let storage = LocalStorage::new(StoragePaths::new(temp.path().join("ssb")));
        (temp, storage)
    }

    #[test]
    fn restore_writes_derived_identity() {
        let (_temp, storage) = setup();
        let expected = Keypair::from_seed(&[11u8; 32]);

        let code = restore(&storage, &expected.to_words().unwrap()).unwrap();
        assert_eq!(code, RestoreCode::IdentityReady);
        assert_eq!(SecretFile::new(&storage).load().unwrap(), expected);
    }

    #[test]
    fn restore_replaces_trivial_secret() {
        let (_temp, storage) = setup();
        let fresh = SecretFile::new(&storage);
        storage.initialize().unwrap();
        let generated = fresh.load_or_create().unwrap();

        let expected = Keypair::from_seed(&[12u8; 32]);
        assert_eq!(
            restore(&storage, &expected.to_words().unwrap()).unwrap(),
            RestoreCode::IdentityReady
        );
        let loaded = fresh.load().unwrap();
        assert_eq!(loaded, expected);
        assert_ne!(loaded, generated);
    }

    #[test]
    fn mature_log_blocks_restore_and_keeps_secret() {
        let (_temp, storage) = setup();
        storage.initialize().unwrap();
        let existing = SecretFile::new(&storage).load_or_create().unwrap();
        fs::create_dir_all(storage.paths().log_dir()).unwrap();
        fs::write(storage.paths().log(), [1u8; 64]).unwrap();

        let words = Keypair::from_seed(&[1u8; 32]).to_words().unwrap();
        let code = restore(&storage, &words).unwrap();
        assert_eq!(code, RestoreCode::OverwriteRisk);
        assert_eq!(SecretFile::new(&storage).load().unwrap(), existing);
    }

    #[test]
    fn guard_runs_before_phrase_validation() {
        let (_temp, storage) = setup();
        fs::create_dir_all(storage.paths().legacy_log_dir()).unwrap();
        fs::write(storage.paths().legacy_log(), [1u8; 10]).unwrap();

        assert_eq!(
            restore(&storage, "too short").unwrap(),
            RestoreCode::OverwriteRisk
        );
    }

    #[test]
    fn rejected_phrases_map_to_codes() {
        let (_temp, storage) = setup();
        assert_eq!(restore(&storage, "one two").unwrap(), RestoreCode::TooShort);
        assert_eq!(
            restore(&storage, &vec!["abandon"; 24].join(" ")).unwrap(),
            RestoreCode::Incorrect
        );
        assert!(!storage.paths().secret().exists());
    }

    #[test]
    fn codes_serialize_as_protocol_strings() {
        assert_eq!(
            serde_json::to_string(&RestoreCode::OverwriteRisk).unwrap(),
            "\"OVERWRITE_RISK\""
        );
        assert_eq!(
            serde_json::to_string(&RestoreCode::IdentityReady).unwrap(),
            "\"IDENTITY_READY\""
        );
    }
}
