// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use ssb_lifecycle::backend::{serve, IdentityService};
use ssb_lifecycle::config::{AppConfig, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV};
use ssb_lifecycle::error::BackendError;
use ssb_lifecycle::state::AppState;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error, stopping");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout carries protocol replies.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format == "json");

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run() -> Result<(), BackendError> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        root = %config.ssb_dir.display(),
        platform = %config.platform,
        "identity backend starting"
    );

    let state = AppState::new(IdentityService::new(config));
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("interrupt received");
                    shutdown.cancel();
                }
                Err(e) => tracing::warn!(error = %e, "cannot listen for interrupts"),
            }
        }
    });

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let served = serve(&state, input, &mut output, shutdown).await;

    state.service.lock().await.shutdown()?;
    tracing::info!("identity backend stopped");
    served
}
