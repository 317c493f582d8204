// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTL-bounded value store.
//!
//! Entries are written whole on successful completion and replaced whole
//! after expiry; readers never observe a partial entry. The mutex is held
//! only for the map operation, never across an await.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Cloneable TTL store keyed by fingerprint strings.
pub struct TtlStore<V> {
    entries: Arc<Mutex<HashMap<String, Entry<V>>>>,
}

impl<V> Clone for TtlStore<V> {
    fn clone(&self) -> Self {
        Self { entries: Arc::clone(&self.entries) }
    }
}

impl<V: Clone> Default for TtlStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlStore<V> {
    pub fn new() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Return the live value for `key`, dropping it if expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or replace the entry for `key`, expiring after `ttl`.
    pub fn put(&self, key: &str, value: V, ttl: Duration) {
        let entry = Entry { value, expires_at: Instant::now() + ttl };
        self.entries.lock().insert(key.to_string(), entry);
    }

    /// Drop the entry for `key` if present.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
