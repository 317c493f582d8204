// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedding-vector cache: exact-key coalescing over the generic pattern.

use std::sync::Arc;

use async_trait::async_trait;
use ov_core::fingerprint;

use crate::flight::{CacheConfig, CoalescingCache};
use crate::CacheError;

/// Outbound embedding interface.
#[async_trait]
pub trait EmbedClient: Send + Sync + 'static {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, String>;
}

/// Coalescing cache for embedding lookups.
#[derive(Clone)]
pub struct EmbedCache {
    inner: CoalescingCache<Vec<f32>>,
}

impl EmbedCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { inner: CoalescingCache::new(config) }
    }

    /// TTL, soft timeout, and concurrency bound from `OV_EMBED_*`.
    pub fn from_env() -> Self {
        Self::new(CacheConfig {
            ttl: ov_core::config::embed_ttl(),
            soft_timeout: ov_core::config::embed_timeout(),
            max_concurrency: ov_core::config::embed_max_concurrency(),
        })
    }

    /// Embed `text` with `model`, serving repeats from cache and merging
    /// concurrent identical lookups into one outbound call.
    pub async fn embed(
        &self,
        client: Arc<dyn EmbedClient>,
        text: &str,
        model: &str,
    ) -> Result<Vec<f32>, CacheError> {
        let key = fingerprint(&[text, model]);
        let text = text.to_string();
        let model = model.to_string();
        let producer = async move { client.embed(&text, &model).await };
        self.inner.get_or_compute(&key, None, producer).await
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }
}

#[cfg(test)]
#[path = "embed_tests.rs"]
mod tests;
