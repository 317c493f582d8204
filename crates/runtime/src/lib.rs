// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ov-runtime: the supervised background-loop core.
//!
//! The supervisor starts every named job and restarts unexpected failures
//! with bounded, jittered backoff. The dispatcher relays messages between
//! the inbound and processing queues, in arrival order or by priority. The
//! autotune controller flips the dispatcher mode from queue saturation and
//! persists its decision; the watchdog turns scheduler lag into the global
//! throttle signal.

pub mod autotune;
pub mod dispatcher;
pub mod executor;
pub mod settings;
pub mod supervisor;
pub mod watchdog;

pub use autotune::{load_decision, queue_depth, store_decision, Autotune, AutotuneConfig, Decision};
pub use dispatcher::Dispatcher;
pub use executor::Executor;
pub use settings::LiveSettings;
pub use supervisor::{BackoffConfig, JobSpec, Supervisor};
pub use watchdog::{LagTracker, Watchdog, WatchdogConfig};

use thiserror::Error;

/// Runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A supervised job failed for a reason it could not recover from.
    #[error("job failed: {0}")]
    Job(String),

    /// The peer side of a relay queue is gone.
    #[error("queue closed")]
    QueueClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state error: {0}")]
    State(#[from] serde_json::Error),
}
