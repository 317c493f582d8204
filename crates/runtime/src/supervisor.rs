// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job supervision with bounded restarts.
//!
//! Every background loop runs as a named job under the supervisor. A job
//! that returns an error or panics is restarted after an exponential,
//! jittered backoff; once its restart budget is spent the job is abandoned
//! and the rest of the runtime keeps going.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use ov_core::Shutdown;

use crate::RuntimeError;

type JobFuture = Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send>>;

/// How long the supervisor waits for jobs to wind down after shutdown
/// before aborting what is left.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// A named job plus a factory that builds a fresh future for each start.
pub struct JobSpec {
    name: &'static str,
    factory: Box<dyn Fn() -> JobFuture + Send>,
}

impl JobSpec {
    pub fn new<F, Fut>(name: &'static str, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), RuntimeError>> + Send + 'static,
    {
        Self { name, factory: Box::new(move || Box::pin(factory())) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Restart policy shared by all supervised jobs.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub min: Duration,
    pub max: Duration,
    pub restart_limit: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(200),
            max: Duration::from_secs(30),
            restart_limit: 5,
        }
    }
}

impl BackoffConfig {
    pub fn from_env() -> Self {
        Self {
            min: ov_core::config::backoff_min(),
            max: ov_core::config::backoff_max(),
            restart_limit: ov_core::config::autorestart_limit(),
        }
    }
}

/// Delay before the next restart: `min * 2^restarts` capped at `max`,
/// multiplied by a jitter factor in [0.7, 1.3) so failing jobs do not
/// restart in lockstep.
pub(crate) fn backoff_delay(config: &BackoffConfig, restarts: u32) -> Duration {
    let factor = 1u64 << restarts.min(20);
    let base_ms = (config.min.as_millis() as u64)
        .saturating_mul(factor)
        .min(config.max.as_millis() as u64);
    let jitter: f64 = rand::rng().random_range(0.7..1.3);
    Duration::from_millis((base_ms as f64 * jitter) as u64)
}

enum Outcome {
    Finished(Result<(), RuntimeError>),
    RestartDue,
}

/// Runs a fixed set of jobs to completion, restarting failures.
pub struct Supervisor {
    backoff: BackoffConfig,
}

impl Supervisor {
    pub fn new(backoff: BackoffConfig) -> Self {
        Self { backoff }
    }

    /// Run `jobs` until they all complete (or exhaust their restarts), or
    /// until `shutdown` fires. On shutdown, jobs get a grace period to
    /// observe the token and wind down before being aborted.
    pub async fn run(&self, jobs: Vec<JobSpec>, shutdown: Shutdown) {
        let mut set: JoinSet<Outcome> = JoinSet::new();
        let mut owners: HashMap<tokio::task::Id, usize> = HashMap::new();
        let mut restarts: Vec<u32> = vec![0; jobs.len()];

        for (index, job) in jobs.iter().enumerate() {
            info!(job = job.name, "starting job");
            let fut = (job.factory)();
            let handle = set.spawn(async move { Outcome::Finished(fut.await) });
            owners.insert(handle.id(), index);
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                joined = set.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((id, Outcome::RestartDue)) => {
                            let Some(index) = owners.remove(&id) else { continue };
                            if shutdown.is_triggered() {
                                continue;
                            }
                            info!(job = jobs[index].name, "restarting job");
                            let fut = (jobs[index].factory)();
                            let handle =
                                set.spawn(async move { Outcome::Finished(fut.await) });
                            owners.insert(handle.id(), index);
                        }
                        Ok((id, Outcome::Finished(result))) => {
                            let Some(index) = owners.remove(&id) else { continue };
                            match result {
                                Ok(()) => info!(job = jobs[index].name, "job completed"),
                                Err(e) => self.schedule_restart(
                                    &jobs,
                                    index,
                                    e.to_string(),
                                    &mut restarts,
                                    &mut set,
                                    &mut owners,
                                ),
                            }
                        }
                        Err(join_err) => {
                            let Some(index) = owners.remove(&join_err.id()) else { continue };
                            if join_err.is_cancelled() {
                                continue;
                            }
                            self.schedule_restart(
                                &jobs,
                                index,
                                format!("panicked: {join_err}"),
                                &mut restarts,
                                &mut set,
                                &mut owners,
                            );
                        }
                    }
                }
            }
        }

        // Grace period for cooperative wind-down, then abort stragglers.
        let drain = async {
            while set.join_next().await.is_some() {}
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            warn!("jobs still running after grace period, aborting");
        }
        set.shutdown().await;
    }

    fn schedule_restart(
        &self,
        jobs: &[JobSpec],
        index: usize,
        reason: String,
        restarts: &mut [u32],
        set: &mut JoinSet<Outcome>,
        owners: &mut HashMap<tokio::task::Id, usize>,
    ) {
        let count = restarts[index];
        if count >= self.backoff.restart_limit {
            error!(
                job = jobs[index].name,
                %reason,
                restarts = count,
                "restart limit reached, abandoning job"
            );
            return;
        }
        restarts[index] = count + 1;
        let delay = backoff_delay(&self.backoff, count);
        warn!(
            job = jobs[index].name,
            %reason,
            restart = count + 1,
            delay_ms = delay.as_millis() as u64,
            "job failed, restart scheduled"
        );
        let handle = set.spawn(async move {
            sleep(delay).await;
            Outcome::RestartDue
        });
        owners.insert(handle.id(), index);
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
