// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the runtime.
//!
//! Every knob is optional; defaults are baked in here so callers never have
//! to guess. Consumers assemble their own typed config structs from these
//! accessors at startup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine state directory")]
    NoStateDir,
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|s| s.parse::<f64>().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Resolve state directory: OV_STATE_DIR > XDG_STATE_HOME/ov > ~/.local/state/ov
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("OV_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ov"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/ov"))
}

/// Bounded capacity of the inbound and processing queues
pub fn queue_maxsize() -> usize {
    env_u64("OV_QUEUE_MAXSIZE", 64).max(1) as usize
}

/// Whether the dispatcher starts in priority mode
pub fn use_priority_queue() -> bool {
    env_bool("OV_USE_PRIORITY_QUEUE", false)
}

/// Cooperative scheduling budget for the dispatcher
pub fn hard_rt_budget() -> Duration {
    Duration::from_millis(env_u64("OV_HARD_RT_BUDGET_MS", 50))
}

/// Hint for blocking-offload worker threads
pub fn threads_max_workers() -> usize {
    env_u64("OV_THREADS_MAX_WORKERS", 4).max(1) as usize
}

/// Whether the autotune controller may flip the dispatcher mode
pub fn auto_tune() -> bool {
    env_bool("OV_AUTO_TUNE", true)
}

/// Saturation EMA level at which priority mode is enabled
pub fn saturate_enable_ratio() -> f64 {
    env_f64("OV_SATURATE_ENABLE_RATIO", 0.6)
}

/// Saturation EMA level at which priority mode is disabled
pub fn saturate_disable_ratio() -> f64 {
    env_f64("OV_SATURATE_DISABLE_RATIO", 0.25)
}

/// Saturation observation window; also the autotune mode-switch cooldown
pub fn saturate_window() -> Duration {
    Duration::from_millis(env_u64("OV_SATURATE_WINDOW_MS", 2_000))
}

/// Maximum restarts per supervised job before it is abandoned
pub fn autorestart_limit() -> u32 {
    env_u64("OV_AUTORESTART_LIMIT", 5) as u32
}

/// Minimum restart backoff delay
pub fn backoff_min() -> Duration {
    Duration::from_millis(env_u64("OV_BACKOFF_MIN_MS", 200))
}

/// Maximum restart backoff delay
pub fn backoff_max() -> Duration {
    Duration::from_millis(env_u64("OV_BACKOFF_MAX_MS", 30_000))
}

/// Hard wall-clock limit for a sandbox run
pub fn sandbox_max() -> Duration {
    Duration::from_millis(env_u64("OV_SANDBOX_MAX_MS", 20_000))
}

/// How long a finished sandbox result serves identical code without re-running
pub fn sandbox_ttl() -> Duration {
    Duration::from_millis(env_u64("OV_SANDBOX_TTL_MS", 1_000))
}

/// Sandbox process ceiling across the whole process
pub fn sandbox_max_concurrency() -> usize {
    env_u64("OV_SANDBOX_MAX_CONCURRENCY", 2).max(1) as usize
}

/// LLM completion cache TTL
pub fn llm_ttl() -> Duration {
    Duration::from_secs(env_u64("OV_LLM_TTL_SEC", 300))
}

/// LLM soft timeout (caller stops waiting; the call keeps running)
pub fn llm_timeout() -> Duration {
    Duration::from_millis(env_u64("OV_LLM_TIMEOUT_MS", 30_000))
}

/// Bound on concurrent outbound LLM calls
pub fn llm_max_concurrency() -> usize {
    env_u64("OV_LLM_MAX_CONCURRENCY", 4).max(1) as usize
}

/// Embedding cache TTL
pub fn embed_ttl() -> Duration {
    Duration::from_secs(env_u64("OV_EMBED_TTL_SEC", 600))
}

/// Embedding soft timeout
pub fn embed_timeout() -> Duration {
    Duration::from_millis(env_u64("OV_EMBED_TIMEOUT_MS", 10_000))
}

/// Bound on concurrent outbound embedding calls
pub fn embed_max_concurrency() -> usize {
    env_u64("OV_EMBED_MAX_CONCURRENCY", 4).max(1) as usize
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
