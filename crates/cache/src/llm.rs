// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! LLM completion cache.
//!
//! Exact-key caching plus family-level single-flight: while a call is in
//! flight, requests that differ only in minor sampling parameters attach to
//! it instead of dialing out. That is a deliberate latency/determinism
//! trade-off carried over from the original runtime; the ignored-parameter
//! set is explicit and configurable rather than implicit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use ov_core::fingerprint;

use crate::flight::{CacheConfig, CoalescingCache};
use crate::CacheError;

/// Outbound model-call interface. The core never sees provider specifics.
#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    /// Run one completion. The error is an opaque reason string.
    async fn complete(&self, request: &LlmRequest) -> Result<String, String>;
}

/// All semantically relevant inputs to a completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmRequest {
    pub instructions: String,
    pub model: String,
    pub input: String,
    /// Extra sampling parameters (temperature, top_p, ...), sorted for
    /// deterministic fingerprints.
    pub params: BTreeMap<String, String>,
}

impl LlmRequest {
    pub fn new(
        instructions: impl Into<String>,
        model: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            instructions: instructions.into(),
            model: model.into(),
            input: input.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Exact fingerprint over every field, including all params.
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<&str> = vec![&self.instructions, &self.model, &self.input];
        for (key, value) in &self.params {
            parts.push(key);
            parts.push(value);
        }
        fingerprint(&parts)
    }

    /// Family fingerprint: skips the configured minor sampling parameters so
    /// near-identical concurrent calls share one flight.
    pub fn family_fingerprint(&self, ignored: &BTreeSet<String>) -> String {
        let mut parts: Vec<&str> = vec![&self.instructions, &self.model, &self.input];
        for (key, value) in &self.params {
            if ignored.contains(key) {
                continue;
            }
            parts.push(key);
            parts.push(value);
        }
        fingerprint(&parts)
    }
}

/// Configuration for the LLM cache.
#[derive(Debug, Clone)]
pub struct LlmCacheConfig {
    pub cache: CacheConfig,
    /// Params excluded from the family fingerprint.
    pub family_ignored_params: BTreeSet<String>,
}

impl Default for LlmCacheConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            family_ignored_params: ["temperature", "top_p", "seed"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl LlmCacheConfig {
    /// TTL, soft timeout, and concurrency bound from `OV_LLM_*`.
    pub fn from_env() -> Self {
        Self {
            cache: CacheConfig {
                ttl: ov_core::config::llm_ttl(),
                soft_timeout: ov_core::config::llm_timeout(),
                max_concurrency: ov_core::config::llm_max_concurrency(),
            },
            ..Self::default()
        }
    }
}

/// Coalescing cache for LLM completions.
#[derive(Clone)]
pub struct LlmCache {
    inner: CoalescingCache<String>,
    family_ignored_params: BTreeSet<String>,
}

impl LlmCache {
    pub fn new(config: LlmCacheConfig) -> Self {
        Self {
            inner: CoalescingCache::new(config.cache),
            family_ignored_params: config.family_ignored_params,
        }
    }

    /// Complete `request` through `client`, serving from cache or an
    /// in-flight family call when possible.
    pub async fn complete(
        &self,
        client: Arc<dyn LlmClient>,
        request: LlmRequest,
    ) -> Result<String, CacheError> {
        let key = request.fingerprint();
        let family = request.family_fingerprint(&self.family_ignored_params);
        let producer = async move { client.complete(&request).await };
        self.inner.get_or_compute(&key, Some(&family), producer).await
    }

    pub fn invalidate(&self, request: &LlmRequest) {
        self.inner.invalidate(&request.fingerprint());
    }
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
