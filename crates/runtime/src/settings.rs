// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live runtime settings shared between the dispatcher, the autotune
//! controller, and the watchdog. Plain atomics so hot loops read them
//! without locking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Budget ceiling while the priority queue is active. Priority mode exists
/// to keep latency down under load, so the dispatch budget tightens with it.
pub const PRIORITY_BUDGET_CLAMP_MS: u64 = 25;

/// Mutable runtime knobs, updated by the autotune controller and read by
/// the dispatcher on every cycle.
pub struct LiveSettings {
    use_priority: AtomicBool,
    budget_ms: AtomicU64,
    base_budget_ms: u64,
}

impl LiveSettings {
    pub fn new(use_priority: bool, budget: Duration) -> Arc<Self> {
        let base_budget_ms = budget.as_millis() as u64;
        let settings = Arc::new(Self {
            use_priority: AtomicBool::new(use_priority),
            budget_ms: AtomicU64::new(base_budget_ms),
            base_budget_ms,
        });
        if use_priority {
            settings.clamp_budget();
        }
        settings
    }

    /// Initial values from `OV_USE_PRIORITY_QUEUE` and `OV_HARD_RT_BUDGET_MS`.
    pub fn from_env() -> Arc<Self> {
        Self::new(ov_core::config::use_priority_queue(), ov_core::config::hard_rt_budget())
    }

    pub fn use_priority(&self) -> bool {
        self.use_priority.load(Ordering::Relaxed)
    }

    pub fn set_use_priority(&self, on: bool) {
        self.use_priority.store(on, Ordering::Relaxed);
        if on {
            self.clamp_budget();
        } else {
            self.restore_budget();
        }
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms.load(Ordering::Relaxed))
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms.load(Ordering::Relaxed)
    }

    pub fn base_budget_ms(&self) -> u64 {
        self.base_budget_ms
    }

    fn clamp_budget(&self) {
        self.budget_ms.store(self.base_budget_ms.min(PRIORITY_BUDGET_CLAMP_MS), Ordering::Relaxed);
    }

    fn restore_budget(&self) {
        self.budget_ms.store(self.base_budget_ms, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
