// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-loop watchdog.
//!
//! Sleeps for a fixed period and measures how late the wakeup was. The lag
//! is smoothed with an EMA and compared against hysteresis thresholds
//! derived from the dispatch budget: sustained lag engages the global
//! throttle, and the throttle releases only once the smoothed lag falls
//! well below the point that engaged it.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use ov_core::{Shutdown, Throttle};

use crate::RuntimeError;

const LAG_ALPHA: f64 = 0.25;

const MIN_PERIOD: Duration = Duration::from_millis(50);
const MAX_PERIOD: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Sampling period.
    pub period: Duration,
    /// Smoothed lag at which the throttle engages.
    pub engage_threshold: Duration,
    /// Smoothed lag at which an engaged throttle releases.
    pub release_threshold: Duration,
}

impl WatchdogConfig {
    /// Derive thresholds from the saturation window and the base dispatch
    /// budget. Lag of twice the budget means the scheduler can no longer
    /// honor it; release waits for clear headroom below the budget.
    pub fn derive(window: Duration, budget: Duration) -> Self {
        Self {
            period: window.clamp(MIN_PERIOD, MAX_PERIOD),
            engage_threshold: budget * 2,
            release_threshold: budget.mul_f64(0.7),
        }
    }

    pub fn from_env() -> Self {
        Self::derive(ov_core::config::saturate_window(), ov_core::config::hard_rt_budget())
    }
}

/// Smoothed-lag state machine, separated from the timer loop so the
/// hysteresis is testable with synthetic samples.
pub struct LagTracker {
    ema_ms: f64,
    engage_ms: f64,
    release_ms: f64,
}

impl LagTracker {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            ema_ms: 0.0,
            engage_ms: config.engage_threshold.as_secs_f64() * 1_000.0,
            release_ms: config.release_threshold.as_secs_f64() * 1_000.0,
        }
    }

    /// Feed one lag sample and flip the throttle when a threshold is
    /// crossed. Returns the new smoothed lag in milliseconds.
    pub fn observe(&mut self, lag: Duration, throttle: &Throttle) -> f64 {
        let lag_ms = lag.as_secs_f64() * 1_000.0;
        self.ema_ms = LAG_ALPHA * lag_ms + (1.0 - LAG_ALPHA) * self.ema_ms;

        if !throttle.is_engaged() && self.ema_ms >= self.engage_ms {
            throttle.engage();
            warn!(lag_ms = self.ema_ms, "event loop lagging, throttle engaged");
        } else if throttle.is_engaged() && self.ema_ms <= self.release_ms {
            throttle.release();
            info!(lag_ms = self.ema_ms, "event loop recovered, throttle released");
        }
        self.ema_ms
    }
}

pub struct Watchdog {
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig) -> Self {
        Self { config }
    }

    /// Sample scheduler lag until shutdown.
    pub async fn run(self, throttle: Throttle, shutdown: Shutdown) -> Result<(), RuntimeError> {
        let mut tracker = LagTracker::new(&self.config);
        loop {
            let expected = Instant::now() + self.config.period;
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep_until(expected) => {}
            }
            // duration_since saturates to zero for an early wakeup.
            let lag = Instant::now().duration_since(expected);
            tracker.observe(lag, &throttle);
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
