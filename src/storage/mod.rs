// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Root
//!
//! A storage root is a plain directory named by configuration. Everything
//! this crate persists lives under it:
//!
//! ```text
//! <root>/
//!   secret               # Identity keypair (JSON, owner read-only)
//!   flume/log.offset     # Legacy-format append-only log
//!   db2/log.bipf         # Current-format append-only log
//!   db2/indexes/         # Engine indexes (cleared by some fixes)
//!   db2/jit/             # Prefix indexes (cleared by some fixes)
//!   blobs/               # Content-addressed blobs
//!   conn.json            # Peer connection cache
//!   conn-attempts.json   # Connection-attempt history
//!   issue<N>             # Zero-byte one-time fix markers
//! ```
//!
//! Only one process touches a given root at a time; nothing here locks.

pub mod local_fs;
pub mod paths;

pub use local_fs::{
    ensure_dir, file_size, move_path, remove_dir_if_exists, LocalStorage, MoveOutcome,
    StorageError, StorageResult,
};
pub use paths::{StoragePaths, AUXILIARY_FILES, SECRET_FILE};
