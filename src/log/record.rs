// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Structured view of a current-format log record.
//!
//! A record payload is a BIPF object `{ key, value, timestamp }` where
//! `key` is the message's content address, e.g. `%<base64 hash>.sha256`.

use super::bipf::{self, BipfError, Value};

/// Name of the field that identifies a record.
pub const KEY_FIELD: &str = "key";

/// Length of a [`ShortKey`].
pub const SHORT_KEY_LEN: usize = 32;

/// Per-record decode failure. Never aborts a scan.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("malformed BIPF: {0}")]
    Bipf(#[from] BipfError),

    #[error("record is not an object")]
    NotAnObject,

    #[error("key field is not a string or buffer")]
    KeyNotBytes,

    #[error("key of {0} bytes is too short for a short key")]
    KeyTooShort(usize),
}

/// Fixed-length prefix of a record key, used to spot duplicates cheaply.
///
/// It is bytes `1..33` of the key: the first byte is the sigil (`%`) and
/// the next 32 are the leading characters of the hash. Records written by
/// the storage engine are compared this way, so the slice must not move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortKey([u8; SHORT_KEY_LEN]);

impl ShortKey {
    /// Derive the short key from a full key.
    pub fn from_key(key: &[u8]) -> Result<Self, RecordError> {
        key.get(1..1 + SHORT_KEY_LEN)
            .and_then(|slice| slice.try_into().ok())
            .map(ShortKey)
            .ok_or(RecordError::KeyTooShort(key.len()))
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_KEY_LEN] {
        &self.0
    }

    /// Read the short key straight from an encoded record.
    ///
    /// Seeks the key field without decoding the rest of the record.
    /// `Ok(None)` means the record has no key field.
    pub fn from_encoded(payload: &[u8]) -> Result<Option<Self>, RecordError> {
        let Some(pos) = bipf::seek_key(payload, 0, KEY_FIELD.as_bytes())? else {
            return Ok(None);
        };
        let key = bipf::bytes_at(payload, pos)?.ok_or(RecordError::KeyNotBytes)?;
        Self::from_key(key).map(Some)
    }
}

/// A decoded log record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Content address, when the record carries one.
    pub key: Option<String>,
    /// Message body.
    pub value: Option<Value>,
    /// Local receive time in milliseconds.
    pub timestamp: Option<f64>,
}

impl LogRecord {
    /// Decode an encoded record.
    pub fn decode(payload: &[u8]) -> Result<Self, RecordError> {
        let Value::Object(fields) = bipf::decode(payload)? else {
            return Err(RecordError::NotAnObject);
        };

        let mut record = LogRecord {
            key: None,
            value: None,
            timestamp: None,
        };
        for (name, value) in fields {
            match (name.as_str(), value) {
                (KEY_FIELD, Value::String(key)) => record.key = Some(key),
                (KEY_FIELD, _) => return Err(RecordError::KeyNotBytes),
                ("value", value) => record.value = Some(value),
                ("timestamp", Value::Double(ts)) => record.timestamp = Some(ts),
                ("timestamp", Value::Int(ts)) => record.timestamp = Some(f64::from(ts)),
                _ => {}
            }
        }
        Ok(record)
    }

    /// Encode into a BIPF object with fields in `key, value, timestamp` order.
    pub fn encode(&self) -> Vec<u8> {
        let mut fields = Vec::with_capacity(3);
        if let Some(key) = &self.key {
            fields.push((KEY_FIELD.to_string(), Value::String(key.clone())));
        }
        if let Some(value) = &self.value {
            fields.push(("value".to_string(), value.clone()));
        }
        if let Some(ts) = self.timestamp {
            fields.push(("timestamp".to_string(), Value::Double(ts)));
        }
        bipf::encode(&Value::Object(fields))
    }

    /// Build from the JSON shape used by the legacy log.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, RecordError> {
        if !json.is_object() {
            return Err(RecordError::NotAnObject);
        }
        let key = match json.get(KEY_FIELD) {
            None => None,
            Some(serde_json::Value::String(key)) => Some(key.clone()),
            Some(_) => return Err(RecordError::KeyNotBytes),
        };
        Ok(LogRecord {
            key,
            value: json.get("value").map(Value::from_json),
            timestamp: json.get("timestamp").and_then(serde_json::Value::as_f64),
        })
    }

    #[cfg(test)]
    pub(crate) fn short_key(&self) -> Option<Result<ShortKey, RecordError>> {
        self.key.as_deref().map(|key| ShortKey::from_key(key.as_bytes()))
    }
}
