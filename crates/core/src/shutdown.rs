// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global cooperative shutdown signal.
//!
//! Every background component holds a clone and either polls
//! `is_triggered()` at loop boundaries or awaits `cancelled()` inside a
//! `select!`. Shutdown is cooperative: nothing is force-killed except the
//! sandbox worker process on its own hard timeout.

use tokio_util::sync::CancellationToken;

/// Cloneable shutdown signal shared across the whole runtime.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    /// Trigger shutdown. Idempotent; wakes every waiter.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when shutdown has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
