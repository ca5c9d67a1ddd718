// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity backend
//!
//! Reads identity commands line by line, hands them to the
//! [`IdentityService`] and writes each reply as a JSON line. Migration
//! progress is written as it arrives, not when the command finishes.

pub mod protocol;
pub mod service;

pub use protocol::{IdentityCommand, IdentityReply, IdentityStatus, ProtocolError};
pub use service::{EngineHandle, IdentityService};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;
use crate::state::AppState;

/// Serve the identity protocol until `input` ends or `shutdown` fires.
///
/// Shutdown is only checked between commands; a command in flight always
/// runs to completion.
pub async fn serve<R, W>(
    state: &AppState,
    input: R,
    output: &mut W,
    shutdown: CancellationToken,
) -> Result<(), BackendError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::info!("identity protocol shutting down");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::debug!("input closed");
            break;
        };

        let command = match line.parse::<IdentityCommand>() {
            Ok(command) => command,
            Err(ProtocolError::Empty) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "rejected command");
                write_reply(output, &IdentityReply::error(e.to_string())).await?;
                continue;
            }
        };

        let mut service = state.service.lock().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let handling = service.handle(command, |reply| {
                if tx.send(reply).is_err() {
                    tracing::warn!("reply dropped");
                }
            });
            tokio::pin!(handling);
            loop {
                tokio::select! {
                    result = &mut handling => {
                        result?;
                        break;
                    }
                    Some(reply) = rx.recv() => write_reply(output, &reply).await?,
                }
            }
        }
        while let Ok(reply) = rx.try_recv() {
            write_reply(output, &reply).await?;
        }
    }
    Ok(())
}

async fn write_reply<W>(output: &mut W, reply: &IdentityReply) -> Result<(), BackendError>
where
    W: AsyncWrite + Unpin,
{
    output.write_all(reply.to_line()?.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, SSB_DIR_ENV};
    use tempfile::TempDir;

    fn state(temp: &TempDir) -> AppState {
        let root = temp.path().join("ssb").display().to_string();
        let config = AppConfig::from_lookup(move |var| (var == SSB_DIR_ENV).then(|| root.clone()))
            .unwrap();
        AppState::new(IdentityService::new(config))
    }

    async fn session(state: &AppState, input: &str) -> Vec<String> {
        let mut output = Vec::new();
        let shutdown = CancellationToken::new();
        serve(state, input.as_bytes(), &mut output, shutdown)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn answers_each_command_on_its_own_line() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);

        let lines = session(&state, "CREATE\n\nbogus\nUSE\nRESTORE: one two\nCLEAR\n").await;
        assert_eq!(
            lines,
            vec![
                "\"IDENTITY_READY\"",
                "{\"error\":\"unknown command: bogus\"}",
                "\"IDENTITY_READY\"",
                "\"TOO_SHORT\"",
                "\"IDENTITY_CLEARED\"",
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_reading() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut output = Vec::new();
        serve(&state, &b"CREATE\n"[..], &mut output, shutdown)
            .await
            .unwrap();
        assert!(output.is_empty());
        assert!(state.service.lock().await.engine().is_none());
    }

    #[tokio::test]
    async fn fatal_error_ends_the_session() {
        let temp = TempDir::new().unwrap();
        let state = state(&temp);

        let mut output = Vec::new();
        let result = serve(
            &state,
            &b"USE\nCREATE\n"[..],
            &mut output,
            CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(BackendError::Identity(_))));
        assert!(output.is_empty());
    }
}
