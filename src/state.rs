// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::backend::IdentityService;

/// Shared handle on the identity service. Commands are handled one at a
/// time, so the service sits behind a mutex rather than a read-write lock.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Mutex<IdentityService>>,
}

impl AppState {
    pub fn new(service: IdentityService) -> Self {
        Self {
            service: Arc::new(Mutex::new(service)),
        }
    }
}
