// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-sample producer race.
//!
//! Launches several producer variants (minor parameter perturbations of the
//! same request) and returns the first result the caller's validator
//! accepts, aborting the rest. If nothing validates, the earliest successful
//! result wins; if everything fails, the last failure is reported.

use std::future::Future;

use tokio::task::JoinSet;
use tracing::debug;

use crate::CacheError;

/// Race `variants` and pick the first validated result.
pub async fn sample_race<V, F, P>(variants: Vec<F>, validator: P) -> Result<V, CacheError>
where
    V: Send + 'static,
    F: Future<Output = Result<V, String>> + Send + 'static,
    P: Fn(&V) -> bool,
{
    if variants.is_empty() {
        return Err(CacheError::Producer("no variants to race".to_string()));
    }

    let mut set = JoinSet::new();
    for variant in variants {
        set.spawn(variant);
    }

    // Earliest merely-successful result, kept as the fallback winner.
    let mut fallback: Option<V> = None;
    let mut last_failure = "all variants failed".to_string();

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(Ok(value)) => {
                if validator(&value) {
                    debug!(remaining = set.len(), "validated sample won the race");
                    set.abort_all();
                    return Ok(value);
                }
                if fallback.is_none() {
                    fallback = Some(value);
                }
            }
            Ok(Err(reason)) => last_failure = reason,
            Err(join_err) => {
                if !join_err.is_cancelled() {
                    last_failure = join_err.to_string();
                }
            }
        }
    }

    match fallback {
        Some(value) => Ok(value),
        None => Err(CacheError::Producer(last_failure)),
    }
}

#[cfg(test)]
#[path = "race_tests.rs"]
mod tests;
