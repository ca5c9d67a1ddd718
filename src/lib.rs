// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ssb-lifecycle - identity lifecycle and append-only log integrity
//!
//! Backend subsystem of a peer-to-peer social client. It derives and guards
//! the identity keypair, migrates a legacy log into the current format, and
//! repairs the on-disk log once per release.
//!
//! ## Modules
//!
//! - `config` - Environment configuration
//! - `storage` - Storage root layout and filesystem helpers
//! - `identity` - Keypair, recovery phrases, restore guard
//! - `log` - Legacy and current log formats, duplicate compaction
//! - `migration` - Shared-to-private root migration with progress
//! - `fixes` - Marker-gated one-time repairs
//! - `backend` - Line protocol and identity service

pub mod backend;
pub mod config;
pub mod error;
pub mod fixes;
pub mod identity;
pub mod log;
pub mod migration;
pub mod state;
pub mod storage;
