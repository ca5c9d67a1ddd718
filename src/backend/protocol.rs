// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity request protocol.
//!
//! Commands arrive one per line as plain text:
//!
//! ```text
//! CREATE
//! USE
//! RESTORE: <recovery words>
//! MIGRATE
//! CLEAR
//! ```
//!
//! Every reply is one line of JSON: a bare status string such as
//! `"IDENTITY_READY"` or `"TOO_SHORT"`, a progress event
//! `{"migration_progress":0.42}`, or `{"error":"..."}` for a request that
//! could not be understood.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::identity::RestoreCode;

#[derive(Clone, PartialEq, Eq)]
pub enum IdentityCommand {
    /// Load the identity, generating one if there is none.
    Create,
    /// Load the existing identity.
    Use,
    /// Replace the identity with the one encoded by these words.
    Restore(String),
    /// Move a shared desktop install into the private root.
    Migrate,
    /// Delete the storage root.
    Clear,
}

// Recovery words stay out of logs.
impl fmt::Debug for IdentityCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityCommand::Create => f.write_str("Create"),
            IdentityCommand::Use => f.write_str("Use"),
            IdentityCommand::Restore(_) => f.write_str("Restore(..)"),
            IdentityCommand::Migrate => f.write_str("Migrate"),
            IdentityCommand::Clear => f.write_str("Clear"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),
}

impl FromStr for IdentityCommand {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::Empty);
        }
        if let Some(("RESTORE", words)) = line.split_once(':') {
            return Ok(IdentityCommand::Restore(words.trim().to_string()));
        }
        match line {
            "CREATE" => Ok(IdentityCommand::Create),
            "USE" => Ok(IdentityCommand::Use),
            "MIGRATE" => Ok(IdentityCommand::Migrate),
            "CLEAR" => Ok(IdentityCommand::Clear),
            other => Err(ProtocolError::Unknown(
                other.split_whitespace().next().unwrap_or_default().to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IdentityStatus {
    #[serde(rename = "IDENTITY_READY")]
    Ready,
    #[serde(rename = "IDENTITY_CLEARED")]
    Cleared,
}

/// One line written back to the requester.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IdentityReply {
    Status(IdentityStatus),
    Restore(RestoreCode),
    Progress { migration_progress: f64 },
    Error { error: String },
}

impl IdentityReply {
    pub fn error(message: impl Into<String>) -> Self {
        IdentityReply::Error {
            error: message.into(),
        }
    }

    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
