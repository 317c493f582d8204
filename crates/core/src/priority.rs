// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority classification for queue items.
//!
//! The class is derived deterministically from message content and never
//! fails: anything unrecognized is Normal. A process-wide monotonic sequence
//! number is assigned at classification time and used only as a FIFO
//! tie-break within the same class.

use std::sync::atomic::{AtomicU64, Ordering};

/// Message prefix that marks an urgent item
const HIGH_PREFIX: char = '!';

/// Message prefix that marks background bulk work
const LOW_PREFIX: &str = "bulk:";

static SEQ: AtomicU64 = AtomicU64::new(0);

/// Priority class for a queue item. Lower discriminant dispatches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

/// Classify a raw message into a priority class. Never fails.
pub fn classify(body: &str) -> Priority {
    let trimmed = body.trim_start();
    if trimmed.starts_with(HIGH_PREFIX) {
        Priority::High
    } else if trimmed.starts_with(LOW_PREFIX) {
        Priority::Low
    } else {
        Priority::Normal
    }
}

/// Next value of the process-wide classification sequence.
pub fn next_seq() -> u64 {
    SEQ.fetch_add(1, Ordering::Relaxed)
}

/// A classified queue item: priority class, arrival sequence, raw body.
///
/// Ordering is `(priority, seq)` so a min-ordering over `Classified` pops the
/// best class first and preserves arrival order within a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub priority: Priority,
    pub seq: u64,
    pub body: String,
}

impl Classified {
    /// Classify a message, stamping it with the next sequence number.
    pub fn new(body: String) -> Self {
        Self { priority: classify(&body), seq: next_seq(), body }
    }
}

impl Ord for Classified {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

impl PartialOrd for Classified {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
#[path = "priority_tests.rs"]
mod tests;
