// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global producer throttle signal.
//!
//! Engaged and released only by the watchdog; producers voluntarily check
//! `is_engaged()` and pause briefly. The watchdog never stops any work
//! itself, so this is a plain shared flag rather than a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable throttle flag shared between the watchdog and producers.
#[derive(Clone, Default)]
pub struct Throttle {
    engaged: Arc<AtomicBool>,
}

impl Throttle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self) {
        self.engaged.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.engaged.store(false, Ordering::Release);
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[path = "throttle_tests.rs"]
mod tests;
