// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing-queue consumer: hands each dequeued item to the sandbox
//! engine. While the watchdog throttle is engaged the consumer holds the
//! current item and polls until release, which applies backpressure all the
//! way to the inbound queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use ov_core::{Shutdown, Throttle};
use ov_sandbox::SandboxEngine;

use crate::RuntimeError;

/// How long a paused consumer sleeps before rechecking the throttle.
const THROTTLE_PAUSE: Duration = Duration::from_millis(100);

pub struct Executor {
    sandbox: Arc<SandboxEngine>,
    throttle: Throttle,
    shutdown: Shutdown,
}

impl Executor {
    pub fn new(sandbox: Arc<SandboxEngine>, throttle: Throttle, shutdown: Shutdown) -> Self {
        Self { sandbox, throttle, shutdown }
    }

    /// Drain `source` until it closes or shutdown fires.
    pub async fn run(&self, source: &mut mpsc::Receiver<String>) -> Result<(), RuntimeError> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                item = source.recv() => {
                    let Some(body) = item else { return Ok(()) };
                    while self.throttle.is_engaged() {
                        if self.shutdown.is_triggered() {
                            return Ok(());
                        }
                        tokio::time::sleep(THROTTLE_PAUSE).await;
                    }
                    let report = self.sandbox.run(strip_class_prefix(&body)).await;
                    match &report.error {
                        None => info!(key = %report.key, duration_ms = report.duration_ms, "item executed"),
                        Some(error) => warn!(key = %report.key, %error, "item failed"),
                    }
                }
            }
        }
    }
}

/// Drop the priority routing prefix before handing code to the sandbox.
pub fn strip_class_prefix(body: &str) -> &str {
    let trimmed = body.trim_start();
    if let Some(rest) = trimmed.strip_prefix('!') {
        rest.trim_start()
    } else if let Some(rest) = trimmed.strip_prefix("bulk:") {
        rest.trim_start()
    } else {
        trimmed
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
