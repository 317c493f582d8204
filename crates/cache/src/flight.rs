// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request coalescing over the TTL store.
//!
//! `get_or_compute` guarantees at most one producer in flight per key (or
//! per family key) at any time. Waiters attach to a shared watch channel;
//! the soft timeout releases the caller's concurrency slot without
//! cancelling the producer, so late results still land in the cache and
//! still resolve every attached waiter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, warn};

use crate::store::TtlStore;
use crate::CacheError;

/// Tuning for one cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a completed result is served without a fresh producer call.
    pub ttl: Duration,
    /// Soft timeout: how long the initiating caller waits before releasing
    /// its concurrency slot. The producer itself is never cancelled.
    pub soft_timeout: Duration,
    /// Bound on concurrently running producers for this cache.
    pub max_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            soft_timeout: Duration::from_secs(30),
            max_concurrency: 4,
        }
    }
}

type Flight<V> = watch::Receiver<Option<Result<V, CacheError>>>;

/// Generic TTL cache with in-flight deduplication and bounded concurrency.
pub struct CoalescingCache<V> {
    config: CacheConfig,
    store: TtlStore<V>,
    flights: Arc<Mutex<HashMap<String, Flight<V>>>>,
    limiter: Arc<Semaphore>,
}

impl<V> Clone for CoalescingCache<V> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: self.store.clone(),
            flights: Arc::clone(&self.flights),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> CoalescingCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self { config, store: TtlStore::new(), flights: Arc::new(Mutex::new(HashMap::new())), limiter }
    }

    /// Return the cached value for `key`, or coalesce onto the in-flight
    /// producer, or start `producer` as a new flight.
    ///
    /// `family` is an optional looser alias: while a flight for this key is
    /// active it is also registered under the family key, so requests that
    /// differ only in ignored parameters attach instead of dialing out.
    pub async fn get_or_compute<F>(
        &self,
        key: &str,
        family: Option<&str>,
        producer: F,
    ) -> Result<V, CacheError>
    where
        F: Future<Output = Result<V, String>> + Send + 'static,
    {
        if let Some(value) = self.store.get(key) {
            return Ok(value);
        }

        // Attach-or-insert must be atomic: one lock section decides whether
        // this caller becomes the initiator.
        let (tx, rx) = watch::channel(None);
        let existing = {
            let mut flights = self.flights.lock();
            if let Some(flight) = flights.get(key).or_else(|| family.and_then(|f| flights.get(f))) {
                Some(flight.clone())
            } else {
                flights.insert(key.to_string(), rx.clone());
                if let Some(f) = family {
                    flights.insert(f.to_string(), rx.clone());
                }
                None
            }
        };

        if let Some(flight) = existing {
            debug!(key, "attached to in-flight request");
            return wait_on(flight).await;
        }

        // This caller is the initiator: take a slot, then run the producer as
        // an independent task so the soft timeout below cannot cancel it.
        let permit = match Arc::clone(&self.limiter).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                // Semaphore closed — cannot happen while the cache is alive,
                // but unwind the flight entry rather than wedging waiters.
                self.remove_flight(key, family);
                return Err(CacheError::Abandoned);
            }
        };

        let store = self.store.clone();
        let flights = Arc::clone(&self.flights);
        let ttl = self.config.ttl;
        let key_owned = key.to_string();
        let family_owned = family.map(str::to_string);
        tokio::spawn(async move {
            let result = match producer.await {
                Ok(value) => {
                    store.put(&key_owned, value.clone(), ttl);
                    Ok(value)
                }
                Err(reason) => Err(CacheError::Producer(reason)),
            };
            // Remove the flight before resolving waiters: a caller arriving
            // after this sees either the cached value (success) or a clean
            // slate (failure), never a stale flight.
            {
                let mut flights = flights.lock();
                flights.remove(&key_owned);
                if let Some(f) = &family_owned {
                    flights.remove(f);
                }
            }
            if tx.send(Some(result)).is_err() {
                // All waiters went away; result is already in the store.
                debug!(key = %key_owned, "flight resolved with no remaining waiters");
            }
        });

        tokio::select! {
            result = wait_on(rx.clone()) => {
                drop(permit);
                result
            }
            _ = tokio::time::sleep(self.config.soft_timeout) => {
                // Release the slot so other work can dial out, then keep
                // waiting on the shared flight. The producer keeps running.
                drop(permit);
                warn!(key, timeout_ms = self.config.soft_timeout.as_millis() as u64,
                    "soft timeout elapsed; waiting on shared result");
                wait_on(rx).await
            }
        }
    }

    /// Drop the cached value for `key` if present.
    pub fn invalidate(&self, key: &str) {
        self.store.invalidate(key);
    }

    /// Sweep expired entries; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    /// Number of flights currently active (exact keys plus family aliases).
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    fn remove_flight(&self, key: &str, family: Option<&str>) {
        let mut flights = self.flights.lock();
        flights.remove(key);
        if let Some(f) = family {
            flights.remove(f);
        }
    }
}

/// Await the shared result of a flight.
async fn wait_on<V: Clone>(mut flight: Flight<V>) -> Result<V, CacheError> {
    let resolved = flight
        .wait_for(|slot| slot.is_some())
        .await
        .map_err(|_| CacheError::Abandoned)?;
    match resolved.as_ref() {
        Some(result) => result.clone(),
        // wait_for only returns when the slot is Some
        None => Err(CacheError::Abandoned),
    }
}

#[cfg(test)]
#[path = "flight_tests.rs"]
mod tests;
