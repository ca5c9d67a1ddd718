// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and the configuration
//! loaded from them at startup. Every operation in this crate runs against
//! a storage root named here, so a missing required variable is fatal.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SSB_DIR` | Storage root (identity, logs, fix markers) | Required |
//! | `SHARED_SSB_DIR` | Shared legacy root, migration source | Required for migrate |
//! | `MANYVERSE_SSB_DIR` | App-private root, migration destination | Required for migrate |
//! | `MANYVERSE_PLATFORM` | `desktop` or `mobile` | `mobile` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,ssb_lifecycle=debug` |

use std::path::PathBuf;

/// Environment variable name for the storage root.
pub const SSB_DIR_ENV: &str = "SSB_DIR";

/// Environment variable name for the shared legacy root (desktop only).
pub const SHARED_SSB_DIR_ENV: &str = "SHARED_SSB_DIR";

/// Environment variable name for the app-private root (desktop only).
pub const PRIVATE_SSB_DIR_ENV: &str = "MANYVERSE_SSB_DIR";

/// Environment variable name for the deployment platform.
pub const PLATFORM_ENV: &str = "MANYVERSE_PLATFORM";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,ssb_lifecycle=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("migration requires the desktop platform, running on {0}")]
    NotDesktop(Platform),
}

/// Deployment shape of the hosting application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Multi-process desktop build with a shared legacy root.
    Desktop,
    /// Single-process mobile build.
    Mobile,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Desktop => f.write_str("desktop"),
            Platform::Mobile => f.write_str("mobile"),
        }
    }
}

/// Both roots involved in a desktop migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRoots {
    pub shared: PathBuf,
    pub private: PathBuf,
}

/// Configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub ssb_dir: PathBuf,
    pub platform: Platform,
    pub shared_ssb_dir: Option<PathBuf>,
    pub private_ssb_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let ssb_dir = non_empty(SSB_DIR_ENV)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(SSB_DIR_ENV))?;

        let platform = match non_empty(PLATFORM_ENV).as_deref() {
            None | Some("mobile") => Platform::Mobile,
            Some("desktop") => Platform::Desktop,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: PLATFORM_ENV,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            ssb_dir,
            platform,
            shared_ssb_dir: non_empty(SHARED_SSB_DIR_ENV).map(PathBuf::from),
            private_ssb_dir: non_empty(PRIVATE_SSB_DIR_ENV).map(PathBuf::from),
        })
    }

    /// Roots for a desktop migration.
    ///
    /// Fails unless this is a desktop deployment with both roots configured.
    pub fn migration_roots(&self) -> Result<MigrationRoots, ConfigError> {
        if self.platform != Platform::Desktop {
            return Err(ConfigError::NotDesktop(self.platform));
        }
        let shared = self
            .shared_ssb_dir
            .clone()
            .ok_or(ConfigError::Missing(SHARED_SSB_DIR_ENV))?;
        let private = self
            .private_ssb_dir
            .clone()
            .ok_or(ConfigError::Missing(PRIVATE_SSB_DIR_ENV))?;
        // The shared root is deleted once emptied.
        if shared == private {
            return Err(ConfigError::Invalid {
                var: SHARED_SSB_DIR_ENV,
                value: shared.display().to_string(),
            });
        }
        Ok(MigrationRoots { shared, private })
    }
}
