// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Progress stream between a log engine and whoever drives its migration.

use tokio::sync::mpsc;

/// Progress value that signals completion.
pub const COMPLETE: f64 = 1.0;

pub fn is_complete(value: f64) -> bool {
    value >= COMPLETE
}

/// Create a connected sender and subscription.
pub fn progress_channel() -> (ProgressSender, ProgressSubscription) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ProgressSender { tx }, ProgressSubscription { rx })
}

/// Engine side of the stream.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<f64>,
}

impl ProgressSender {
    /// Publish a value. Once the subscriber is gone this does nothing; the
    /// work itself carries on.
    pub fn send(&self, value: f64) {
        if self.tx.send(value).is_err() {
            tracing::trace!(value, "progress dropped, no subscriber");
        }
    }
}

/// Subscriber side of the stream.
///
/// Ending the subscription takes it by value, so it can only happen once.
#[derive(Debug)]
pub struct ProgressSubscription {
    rx: mpsc::UnboundedReceiver<f64>,
}

impl ProgressSubscription {
    /// Next raw value, or `None` once the engine has stopped publishing.
    pub async fn recv(&mut self) -> Option<f64> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

/// Turns raw engine values into a non-decreasing series in `[0, 1]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressGauge {
    last: f64,
}

impl ProgressGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value to relay for `raw`, or `None` if `raw` is not a number.
    pub fn observe(&mut self, raw: f64) -> Option<f64> {
        if raw.is_nan() {
            return None;
        }
        self.last = raw.clamp(self.last, COMPLETE);
        Some(self.last)
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}
