// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recovery phrase → keypair derivation.
//!
//! [`words_to_keys`] is the word-list primitive: 24 BIP39 words encode the
//! 32-byte ed25519 seed, and 48 words (a legacy export) encode the seed
//! followed by the public key. [`derive_keypair`] sits on top of it, applies
//! the user-facing length limits and sorts failures into the codes the UI
//! shows.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::Keypair;

/// Fewer words than this is rejected before touching the primitive.
pub const MIN_WORDS: usize = 24;

/// More words than this is rejected before touching the primitive.
pub const MAX_WORDS: usize = 48;

/// Failure of the word-list primitive.
#[derive(Debug, thiserror::Error)]
pub enum MnemonicError {
    #[error("there should be 24 words (or 48 for a legacy export), got {0}")]
    WordCount(usize),

    #[error("invalid words: {0}")]
    InvalidWords(String),

    #[error("unsupported mnemonic: {0}")]
    Unsupported(bip39::Error),
}

/// Why a phrase was refused. These are shown to the user, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhraseRejection {
    #[error("recovery phrase has fewer than 24 words")]
    TooShort,
    #[error("recovery phrase has more than 48 words")]
    TooLong,
    #[error("recovery phrase contains invalid words")]
    Incorrect,
    #[error("recovery phrase must have exactly 24 or 48 words")]
    WrongLength,
}

/// Outcome of [`derive_keypair`] when no keypair comes out.
#[derive(Debug, thiserror::Error)]
pub enum DeriveError {
    #[error(transparent)]
    Rejected(#[from] PhraseRejection),

    /// A primitive failure that is not a known user error.
    #[error(transparent)]
    Primitive(MnemonicError),
}

/// Derive a keypair from a user-typed recovery phrase.
///
/// Deterministic and free of side effects.
pub fn derive_keypair(words: &str) -> Result<Keypair, DeriveError> {
    let tokens = normalize(words);
    if tokens.len() < MIN_WORDS {
        return Err(PhraseRejection::TooShort.into());
    }
    if tokens.len() > MAX_WORDS {
        return Err(PhraseRejection::TooLong.into());
    }

    words_to_keys(&tokens.join(" ")).map_err(classify)
}

fn classify(err: MnemonicError) -> DeriveError {
    match err {
        MnemonicError::InvalidWords(_) => PhraseRejection::Incorrect.into(),
        MnemonicError::WordCount(_) => PhraseRejection::WrongLength.into(),
        other => DeriveError::Primitive(other),
    }
}

/// Split on whitespace, NFKD-normalize and lowercase every token.
fn normalize(words: &str) -> Vec<String> {
    words
        .split_whitespace()
        .map(|token| token.nfkd().collect::<String>().to_lowercase())
        .collect()
}

/// Word-list primitive over a normalized, single-space separated phrase.
pub fn words_to_keys(phrase: &str) -> Result<Keypair, MnemonicError> {
    let words: Vec<&str> = phrase.split(' ').filter(|w| !w.is_empty()).collect();
    match words.len() {
        24 => {
            let seed = decode_half(&words)?;
            Ok(Keypair::from_seed(&seed))
        }
        48 => {
            let seed = decode_half(&words[..24])?;
            let public = decode_half(&words[24..])?;
            let mut bytes = [0u8; 64];
            bytes[..32].copy_from_slice(&seed);
            bytes[32..].copy_from_slice(&public);
            Keypair::from_keypair_bytes(&bytes).map_err(|_| {
                MnemonicError::InvalidWords("public half does not match the secret half".into())
            })
        }
        n => Err(MnemonicError::WordCount(n)),
    }
}

fn decode_half(words: &[&str]) -> Result<[u8; 32], MnemonicError> {
    let mnemonic = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &words.join(" "))
        .map_err(|e| match e {
            bip39::Error::UnknownWord(index) => {
                MnemonicError::InvalidWords(format!("unknown word at position {}", index + 1))
            }
            bip39::Error::InvalidChecksum => MnemonicError::InvalidWords("bad checksum".into()),
            bip39::Error::BadWordCount(n) => MnemonicError::WordCount(n),
            other => MnemonicError::Unsupported(other),
        })?;

    mnemonic
        .to_entropy()
        .as_slice()
        .try_into()
        .map_err(|_| MnemonicError::WordCount(words.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_seed_phrase() -> String {
        let mut words = vec!["abandon"; 23];
        words.push("art");
        words.join(" ")
    }

    #[test]
    fn derivation_is_deterministic() {
        let phrase = Keypair::from_seed(&[42u8; 32]).to_words().unwrap();
        let a = derive_keypair(&phrase).unwrap();
        let b = derive_keypair(&phrase).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Keypair::from_seed(&[42u8; 32]));
    }

    #[test]
    fn known_phrase_yields_zero_seed() {
        let keypair = derive_keypair(&zero_seed_phrase()).unwrap();
        assert_eq!(keypair.seed(), [0u8; 32]);
    }

    #[test]
    fn input_is_normalized() {
        let shouted = zero_seed_phrase().to_uppercase().replace(' ', "\t ");
        let messy = format!("  {shouted}  \n");
        let keypair = derive_keypair(&messy).unwrap();
        assert_eq!(keypair.seed(), [0u8; 32]);
    }

    #[test]
    fn twenty_three_words_are_too_short() {
        let phrase = vec!["abandon"; 23].join(" ");
        assert!(matches!(
            derive_keypair(&phrase),
            Err(DeriveError::Rejected(PhraseRejection::TooShort))
        ));
    }

    #[test]
    fn forty_nine_words_are_too_long() {
        let phrase = vec!["abandon"; 49].join(" ");
        assert!(matches!(
            derive_keypair(&phrase),
            Err(DeriveError::Rejected(PhraseRejection::TooLong))
        ));
    }

    #[test]
    fn mistyped_word_is_incorrect() {
        let phrase = zero_seed_phrase().replacen("abandon", "abandn", 1);
        assert!(matches!(
            derive_keypair(&phrase),
            Err(DeriveError::Rejected(PhraseRejection::Incorrect))
        ));
    }

    #[test]
    fn bad_checksum_is_incorrect() {
        let phrase = vec!["abandon"; 24].join(" ");
        assert!(matches!(
            derive_keypair(&phrase),
            Err(DeriveError::Rejected(PhraseRejection::Incorrect))
        ));
    }

    #[test]
    fn in_between_lengths_are_wrong_length() {
        let phrase = vec!["abandon"; 30].join(" ");
        assert!(matches!(
            derive_keypair(&phrase),
            Err(DeriveError::Rejected(PhraseRejection::WrongLength))
        ));
    }

    #[test]
    fn legacy_forty_eight_word_export_round_trips() {
        let keypair = Keypair::from_seed(&[17u8; 32]);
        let public_words = bip39::Mnemonic::from_entropy(&keypair.public_key())
            .unwrap()
            .to_string();
        let phrase = format!("{} {}", keypair.to_words().unwrap(), public_words);

        assert_eq!(derive_keypair(&phrase).unwrap(), keypair);
    }

    #[test]
    fn legacy_export_with_foreign_public_half_is_incorrect() {
        let keypair = Keypair::from_seed(&[17u8; 32]);
        let other = Keypair::from_seed(&[18u8; 32]);
        let public_words = bip39::Mnemonic::from_entropy(&other.public_key())
            .unwrap()
            .to_string();
        let phrase = format!("{} {}", keypair.to_words().unwrap(), public_words);

        assert!(matches!(
            derive_keypair(&phrase),
            Err(DeriveError::Rejected(PhraseRejection::Incorrect))
        ));
    }

    #[test]
    fn primitive_messages_keep_their_prefixes() {
        assert!(MnemonicError::WordCount(3)
            .to_string()
            .starts_with("there should be 24 words"));
        assert!(MnemonicError::InvalidWords("x".into())
            .to_string()
            .starts_with("invalid words"));
    }
}
