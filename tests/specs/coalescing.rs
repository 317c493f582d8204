// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache coalescing specs
//!
//! Concurrent identical and near-identical model calls must share one
//! outbound request; results serve from cache within the TTL and refresh
//! after it.

use crate::prelude::*;

use async_trait::async_trait;
use ov_cache::{
    sample_race, CacheConfig, EmbedCache, EmbedClient, LlmCache, LlmCacheConfig, LlmClient,
    LlmRequest,
};

/// Client that counts outbound calls and answers after a short delay, so
/// concurrent requests overlap.
struct CountingClient {
    calls: AtomicUsize,
}

impl CountingClient {
    fn new() -> Arc<Self> {
        Arc::new(Self { calls: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl LlmClient for CountingClient {
    async fn complete(&self, request: &LlmRequest) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(format!("echo:{}", request.input))
    }
}

fn short_ttl_cache() -> LlmCache {
    LlmCache::new(LlmCacheConfig {
        cache: CacheConfig {
            ttl: Duration::from_secs(60),
            soft_timeout: Duration::from_secs(30),
            max_concurrency: 4,
        },
        ..LlmCacheConfig::default()
    })
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_share_one_call() {
    let cache = short_ttl_cache();
    let client = CountingClient::new();
    let request = LlmRequest::new("be brief", "m-large", "what is rust?");

    let a = {
        let cache = cache.clone();
        let client = Arc::clone(&client) as Arc<dyn LlmClient>;
        let request = request.clone();
        tokio::spawn(async move { cache.complete(client, request).await })
    };
    let b = {
        let cache = cache.clone();
        let client = Arc::clone(&client) as Arc<dyn LlmClient>;
        let request = request.clone();
        tokio::spawn(async move { cache.complete(client, request).await })
    };

    assert_eq!(a.await.unwrap().unwrap(), "echo:what is rust?");
    assert_eq!(b.await.unwrap().unwrap(), "echo:what is rust?");
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn temperature_variants_attach_to_the_same_flight() {
    let cache = short_ttl_cache();
    let client = CountingClient::new();
    let base = LlmRequest::new("be brief", "m-large", "same prompt");

    let hot = base.clone().with_param("temperature", "0.9");
    let cold = base.with_param("temperature", "0.1");

    let a = {
        let cache = cache.clone();
        let client = Arc::clone(&client) as Arc<dyn LlmClient>;
        tokio::spawn(async move { cache.complete(client, hot).await })
    };
    // Give the first call time to take off before the variant arrives.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let b = {
        let cache = cache.clone();
        let client = Arc::clone(&client) as Arc<dyn LlmClient>;
        tokio::spawn(async move { cache.complete(client, cold).await })
    };

    assert_eq!(a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn different_prompts_do_not_coalesce() {
    let cache = short_ttl_cache();
    let client = CountingClient::new();

    let first = cache
        .complete(
            Arc::clone(&client) as Arc<dyn LlmClient>,
            LlmRequest::new("be brief", "m-large", "alpha"),
        )
        .await
        .unwrap();
    let second = cache
        .complete(
            Arc::clone(&client) as Arc<dyn LlmClient>,
            LlmRequest::new("be brief", "m-large", "beta"),
        )
        .await
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_ttl_dials_out_again() {
    let cache = LlmCache::new(LlmCacheConfig {
        cache: CacheConfig {
            ttl: Duration::from_secs(1),
            soft_timeout: Duration::from_secs(30),
            max_concurrency: 4,
        },
        ..LlmCacheConfig::default()
    });
    let client = CountingClient::new();
    let request = LlmRequest::new("be brief", "m-large", "again");

    cache
        .complete(Arc::clone(&client) as Arc<dyn LlmClient>, request.clone())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    cache.complete(Arc::clone(&client) as Arc<dyn LlmClient>, request).await.unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

struct CountingEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbedClient for CountingEmbedder {
    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(vec![text.len() as f32])
    }
}

#[tokio::test(start_paused = true)]
async fn concurrent_embed_lookups_merge() {
    let cache = EmbedCache::new(CacheConfig {
        ttl: Duration::from_secs(60),
        soft_timeout: Duration::from_secs(10),
        max_concurrency: 4,
    });
    let client = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });

    let a = {
        let cache = cache.clone();
        let client = Arc::clone(&client) as Arc<dyn EmbedClient>;
        tokio::spawn(async move { cache.embed(client, "shared text", "m-embed").await })
    };
    let b = {
        let cache = cache.clone();
        let client = Arc::clone(&client) as Arc<dyn EmbedClient>;
        tokio::spawn(async move { cache.embed(client, "shared text", "m-embed").await })
    };

    assert_eq!(a.await.unwrap().unwrap(), b.await.unwrap().unwrap());
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn race_prefers_the_validated_sample() {
    let fast_invalid = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok::<_, String>("draft".to_string())
    };
    let slow_valid = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, String>("final".to_string())
    };

    let winner = sample_race(
        vec![
            Box::pin(fast_invalid)
                as std::pin::Pin<Box<dyn std::future::Future<Output = _> + Send>>,
            Box::pin(slow_valid),
        ],
        |v| v == "final",
    )
    .await
    .unwrap();
    assert_eq!(winner, "final");
}
