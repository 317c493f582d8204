// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ov-cache: TTL caching with in-flight request coalescing.
//!
//! The generic pattern (`CoalescingCache`) merges concurrent identical
//! requests into one underlying producer call, bounds outbound concurrency,
//! and serves completed results from a TTL cache. Two concrete consumers are
//! built on it: the LLM completion cache (with family-key single-flight) and
//! the embedding cache.

pub mod embed;
pub mod flight;
pub mod llm;
pub mod race;
pub mod store;

pub use embed::{EmbedCache, EmbedClient};
pub use flight::{CacheConfig, CoalescingCache};
pub use llm::{LlmCache, LlmCacheConfig, LlmClient, LlmRequest};
pub use race::sample_race;
pub use store::TtlStore;

use thiserror::Error;

/// Errors surfaced to cache callers.
///
/// Cloneable so one producer failure can fan out to every attached waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The producer reported a failure. Not cached; the next caller retries.
    #[error("producer failed: {0}")]
    Producer(String),

    /// The in-flight entry was dropped without ever resolving.
    #[error("in-flight request abandoned")]
    Abandoned,
}
