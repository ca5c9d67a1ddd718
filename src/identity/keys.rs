// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ed25519 identity keypair and its on-disk `secret` file.
//!
//! The file is JSON in the layout the feed-replication stack expects:
//!
//! ```text
//! {
//!   "curve": "ed25519",
//!   "public": "<base64 public key>.ed25519",
//!   "private": "<base64 seed||public>.ed25519",
//!   "id": "@<base64 public key>.ed25519"
//! }
//! ```
//!
//! Lines starting with `#` are comments and are ignored when loading.

use base64ct::{Base64, Encoding};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::{IdentityError, MnemonicError};
use crate::storage::LocalStorage;

const CURVE: &str = "ed25519";
const KEY_SUFFIX: &str = ".ed25519";

/// An identity keypair. Immutable once created.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS random source.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Build a keypair from its 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Build a keypair from `seed || public`, checking that they belong together.
    pub fn from_keypair_bytes(bytes: &[u8; 64]) -> Result<Self, ed25519_dalek::SignatureError> {
        SigningKey::from_keypair_bytes(bytes).map(|signing_key| Self { signing_key })
    }

    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Public feed identifier, `@<base64>.ed25519`.
    pub fn id(&self) -> String {
        format!("@{}", self.public_string())
    }

    /// Canonical 24-word recovery phrase for this keypair.
    pub fn to_words(&self) -> Result<String, MnemonicError> {
        bip39::Mnemonic::from_entropy(&self.seed())
            .map(|mnemonic| mnemonic.to_string())
            .map_err(MnemonicError::Unsupported)
    }

    /// Serializable `secret` file contents.
    pub fn to_file(&self) -> KeypairFile {
        KeypairFile {
            curve: CURVE.to_string(),
            public: self.public_string(),
            private: format!(
                "{}{KEY_SUFFIX}",
                Base64::encode_string(&self.signing_key.to_keypair_bytes())
            ),
            id: self.id(),
        }
    }

    /// Parse `secret` file contents, verifying the private half.
    pub fn from_file(file: &KeypairFile) -> Result<Self, IdentityError> {
        if file.curve != CURVE {
            return Err(IdentityError::InvalidKeyFile(format!(
                "unsupported curve {}",
                file.curve
            )));
        }

        let private = decode_key(&file.private, "private")?;
        let bytes: [u8; 64] = private.as_slice().try_into().map_err(|_| {
            IdentityError::InvalidKeyFile(format!(
                "private key must be 64 bytes, got {}",
                private.len()
            ))
        })?;
        let keypair = Self::from_keypair_bytes(&bytes).map_err(|e| {
            IdentityError::InvalidKeyFile(format!("private key does not match itself: {e}"))
        })?;

        if keypair.public_string() != file.public {
            return Err(IdentityError::InvalidKeyFile(
                "public key does not match private key".to_string(),
            ));
        }
        Ok(keypair)
    }

    fn public_string(&self) -> String {
        format!("{}{KEY_SUFFIX}", Base64::encode_string(&self.public_key()))
    }
}

impl PartialEq for Keypair {
    fn eq(&self, other: &Self) -> bool {
        self.seed() == other.seed()
    }
}

impl Eq for Keypair {}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").field("id", &self.id()).finish_non_exhaustive()
    }
}

fn decode_key(value: &str, field: &str) -> Result<Vec<u8>, IdentityError> {
    let encoded = value.strip_suffix(KEY_SUFFIX).ok_or_else(|| {
        IdentityError::InvalidKeyFile(format!("{field} key is missing the {KEY_SUFFIX} suffix"))
    })?;
    Base64::decode_vec(encoded)
        .map_err(|e| IdentityError::InvalidKeyFile(format!("{field} key is not base64: {e}")))
}

/// JSON layout of the `secret` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypairFile {
    pub curve: String,
    pub public: String,
    pub private: String,
    pub id: String,
}

/// Reads and writes the identity `secret` file of a storage root.
pub struct SecretFile<'a> {
    storage: &'a LocalStorage,
}

impl<'a> SecretFile<'a> {
    pub fn new(storage: &'a LocalStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self) -> bool {
        self.storage.paths().secret().is_file()
    }

    /// Load the keypair, failing if the file is absent or malformed.
    pub fn load(&self) -> Result<Keypair, IdentityError> {
        let raw = self.storage.read_raw(self.storage.paths().secret())?;
        let text = String::from_utf8(raw)
            .map_err(|e| IdentityError::InvalidKeyFile(format!("not UTF-8: {e}")))?;
        let json: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n");
        let file: KeypairFile = serde_json::from_str(&json)?;
        Keypair::from_file(&file)
    }

    /// Load the keypair, generating and persisting a new one if absent.
    pub fn load_or_create(&self) -> Result<Keypair, IdentityError> {
        if self.exists() {
            return self.load();
        }

        let keypair = Keypair::generate();
        self.write(&keypair)?;
        tracing::info!(id = %keypair.id(), "created new identity");
        Ok(keypair)
    }

    /// Replace whatever `secret` file exists with `keypair`.
    ///
    /// Callers must have consulted the identity guard first.
    pub fn overwrite(&self, keypair: &Keypair) -> Result<(), IdentityError> {
        self.write(keypair)?;
        tracing::info!(id = %keypair.id(), "wrote restored identity");
        Ok(())
    }

    fn write(&self, keypair: &Keypair) -> Result<(), IdentityError> {
        let json = serde_json::to_string_pretty(&keypair.to_file())?;
        self.storage
            .write_private(self.storage.paths().secret(), json.as_bytes())?;
        Ok(())
    }
}
