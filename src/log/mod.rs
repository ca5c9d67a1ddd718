// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Append-only logs
//!
//! Two on-disk formats live under a storage root:
//!
//! - `flume/log.offset`: the legacy log of length-framed JSON records
//!   ([`legacy`]). Only ever read, to migrate it.
//! - `db2/log.bipf`: the current block log of BIPF records
//!   ([`block_log`]). Records are deleted in place, so offsets never move.
//!
//! [`scanner`] and [`compactor`] implement the one-time duplicate repair
//! over the current log.

pub mod bipf;
pub mod block_log;
pub mod compactor;
pub mod legacy;
pub mod record;
pub mod scanner;

pub use block_log::{
    AppendLog, DeleteOutcome, LogEntry, LogReader, BLOCK_SIZE, MAX_RECORD_LEN,
};
pub use compactor::{CompactionReport, DuplicateCompactor};
pub use legacy::{LegacyEntry, LegacyReader};
#[cfg(test)]
pub(crate) use legacy::LegacyWriter;
pub use record::{LogRecord, RecordError, ShortKey, KEY_FIELD, SHORT_KEY_LEN};
pub use scanner::{LogScanner, ScanItem, ScannedRecord};

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("record of {len} bytes exceeds the {max} byte limit")]
    RecordTooLarge { len: usize, max: usize },

    #[error("record payload is empty")]
    EmptyRecord,

    #[error("record serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl LogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LogError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type LogResult<T> = Result<T, LogError>;
