// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autotune controller: flips the dispatcher mode from queue saturation.
//!
//! The controller samples processing-queue depth, smooths the fill ratio
//! with an EMA, and switches priority mode on when the smoothed ratio
//! crosses the enable threshold and off when it falls below the disable
//! threshold. A switch starts a cooldown of one observation window so the
//! mode cannot flap. Every switch is persisted so a restarted daemon comes
//! back in the mode it had earned.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{info, warn};

use ov_core::config::ConfigError;
use ov_core::Shutdown;

use crate::settings::LiveSettings;
use crate::RuntimeError;

const EMA_ALPHA: f64 = 0.3;

/// Persisted outcome of the last mode switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub use_priority_queue: bool,
    pub hard_rt_budget_ms: u64,
}

/// Read the persisted decision. Any failure (missing file, bad JSON) means
/// "no decision"; autotune state is advisory and never blocks startup.
pub fn load_decision(path: &Path) -> Option<Decision> {
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

/// Persist a decision with a tmp file and rename so a crash mid-write
/// cannot leave a torn file behind.
pub fn store_decision(path: &Path, decision: &Decision) -> Result<(), RuntimeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(decision)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Current depth of a bounded queue as `(used, capacity)`, observed from
/// its sender side.
pub fn queue_depth(sender: &mpsc::Sender<String>) -> (usize, usize) {
    let max = sender.max_capacity();
    (max - sender.capacity(), max)
}

#[derive(Debug, Clone)]
pub struct AutotuneConfig {
    pub enabled: bool,
    pub enable_ratio: f64,
    pub disable_ratio: f64,
    /// Observation window; also the post-switch cooldown.
    pub window: Duration,
    pub decision_path: PathBuf,
}

impl AutotuneConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: ov_core::config::auto_tune(),
            enable_ratio: ov_core::config::saturate_enable_ratio(),
            disable_ratio: ov_core::config::saturate_disable_ratio(),
            window: ov_core::config::saturate_window(),
            decision_path: ov_core::config::state_dir()?.join("autotune.json"),
        })
    }
}

pub struct Autotune {
    config: AutotuneConfig,
    settings: Arc<LiveSettings>,
    ema: f64,
    last_switch: Option<Instant>,
}

impl Autotune {
    pub fn new(config: AutotuneConfig, settings: Arc<LiveSettings>) -> Self {
        Self { config, settings, ema: 0.0, last_switch: None }
    }

    /// Re-apply the persisted mode before the sampling loop starts.
    pub fn apply_persisted(&self) {
        if let Some(decision) = load_decision(&self.config.decision_path) {
            info!(
                use_priority = decision.use_priority_queue,
                "applying persisted autotune decision"
            );
            self.settings.set_use_priority(decision.use_priority_queue);
        }
    }

    /// Sample `depth` until shutdown. `depth` returns `(used, capacity)` of
    /// the queue under observation.
    pub async fn run<D>(mut self, depth: D, shutdown: Shutdown) -> Result<(), RuntimeError>
    where
        D: Fn() -> (usize, usize) + Send,
    {
        self.apply_persisted();
        // Several samples per window keep the EMA responsive while the
        // cooldown still spans a full window.
        let period = (self.config.window / 4).max(Duration::from_millis(50));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(period) => {}
            }

            let (used, capacity) = depth();
            let ratio = if capacity == 0 { 0.0 } else { used as f64 / capacity as f64 };
            self.ema = EMA_ALPHA * ratio + (1.0 - EMA_ALPHA) * self.ema;

            if !self.config.enabled {
                continue;
            }
            if let Some(at) = self.last_switch {
                if at.elapsed() < self.config.window {
                    continue;
                }
            }
            let engaged = self.settings.use_priority();
            if !engaged && self.ema >= self.config.enable_ratio {
                self.switch(true);
            } else if engaged && self.ema <= self.config.disable_ratio {
                self.switch(false);
            }
        }
    }

    fn switch(&mut self, on: bool) {
        self.settings.set_use_priority(on);
        self.last_switch = Some(Instant::now());
        info!(use_priority = on, saturation = self.ema, "autotune switched dispatch mode");
        let decision = Decision {
            use_priority_queue: on,
            hard_rt_budget_ms: self.settings.budget_ms(),
        };
        if let Err(e) = store_decision(&self.config.decision_path, &decision) {
            warn!(error = %e, "failed to persist autotune decision");
        }
    }
}

#[cfg(test)]
#[path = "autotune_tests.rs"]
mod tests;
