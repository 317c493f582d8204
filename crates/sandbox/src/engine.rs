// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sandbox execution engine.
//!
//! Each run spawns the configured interpreter in its own process, streams
//! interleaved stdout/stderr into the run's log file, and enforces a hard
//! wall-clock timeout. A registry keyed by structural hash coalesces
//! duplicate submissions onto the active run and serves just-finished
//! results from a short TTL window. Waiters are resolved through oneshot
//! channels, which hand the report across thread and runtime boundaries.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use ov_core::{Clock, SystemClock};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::key::RunKey;
use crate::logfile;

/// Output line that marks an application-level failure even when the
/// process exited cleanly.
const SENTINEL_ERROR_PREFIX: &str = "ERROR:";
const SENTINEL_TRACEBACK: &str = "Traceback (most recent call last)";

/// How many trailing stderr lines are kept for the failure message.
const STDERR_TAIL_LINES: usize = 20;

/// Cap on waiting for the output readers after the process is gone. A
/// grandchild that inherited the pipes can hold them open indefinitely.
const READER_DRAIN_LIMIT: Duration = Duration::from_millis(500);

/// Sandbox engine configuration.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Interpreter argv prefix; the code is appended as the final argument.
    pub interpreter: Vec<String>,
    /// Directory for per-run log files.
    pub log_dir: PathBuf,
    /// Hard wall-clock limit; the process is killed when it elapses.
    pub max_run: Duration,
    /// How long a finished result serves identical code without re-running.
    pub ttl: Duration,
    /// Process ceiling across all callers.
    pub max_concurrency: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: vec!["python3".to_string(), "-u".to_string(), "-c".to_string()],
            log_dir: std::env::temp_dir().join("ov-sandbox"),
            max_run: Duration::from_secs(20),
            ttl: Duration::from_secs(1),
            max_concurrency: 2,
        }
    }
}

impl SandboxConfig {
    /// Build from environment variables, logging under the state directory.
    pub fn from_env() -> Self {
        let log_dir = ov_core::config::state_dir()
            .map(|d| d.join("sandbox"))
            .unwrap_or_else(|_| std::env::temp_dir().join("ov-sandbox"));
        Self {
            log_dir,
            max_run: ov_core::config::sandbox_max(),
            ttl: ov_core::config::sandbox_ttl(),
            max_concurrency: ov_core::config::sandbox_max_concurrency(),
            ..Self::default()
        }
    }
}

/// Outcome of one sandbox run, delivered to every coalesced caller.
///
/// `error: None` means success. Execution exceptions, the hard timeout, and
/// sentinel error lines all arrive as `Some(message)` so downstream recovery
/// sees one failure shape regardless of how the failure was detected.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub key: RunKey,
    pub log_path: PathBuf,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl RunReport {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(key: &RunKey, log_path: PathBuf, message: impl Into<String>) -> Self {
        Self { key: key.clone(), log_path, duration_ms: 0, error: Some(message.into()) }
    }
}

/// One captured output line, tagged with its stream of origin.
struct CapturedLine {
    from_stderr: bool,
    text: String,
}

/// Shared log sink: writes lines to the run's file as they arrive and keeps
/// them in memory for sentinel scanning.
struct LogSink {
    file: std::fs::File,
    lines: Vec<CapturedLine>,
}

impl LogSink {
    fn append(&mut self, from_stderr: bool, text: &str) {
        // The log file is best-effort; in-memory capture is authoritative.
        let _ = writeln!(self.file, "{text}");
        self.lines.push(CapturedLine { from_stderr, text: text.to_string() });
    }
}

struct Registry {
    active: HashMap<RunKey, Vec<oneshot::Sender<RunReport>>>,
    recent: HashMap<RunKey, (RunReport, Instant)>,
}

impl Registry {
    fn fresh(&mut self, key: &RunKey, ttl: Duration) -> Option<RunReport> {
        match self.recent.get(key) {
            Some((report, at)) if at.elapsed() <= ttl => Some(report.clone()),
            Some(_) => {
                self.recent.remove(key);
                None
            }
            None => None,
        }
    }
}

/// Isolated code-execution engine with run coalescing.
pub struct SandboxEngine<C: Clock = SystemClock> {
    config: SandboxConfig,
    registry: Arc<Mutex<Registry>>,
    limiter: Arc<Semaphore>,
    clock: C,
}

impl SandboxEngine {
    pub fn new(config: SandboxConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SandboxEngine<C> {
    /// Engine with an injected clock; log timestamps follow it.
    pub fn with_clock(config: SandboxConfig, clock: C) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            config,
            registry: Arc::new(Mutex::new(Registry {
                active: HashMap::new(),
                recent: HashMap::new(),
            })),
            limiter,
            clock,
        }
    }

    /// Execute `code`, coalescing with any structurally identical run.
    ///
    /// Every caller — the initiator and all coalesced waiters — receives the
    /// same `RunReport`.
    pub async fn run(&self, code: &str) -> RunReport {
        let key = RunKey::for_code(code);

        // One lock section decides: fresh result, attach, or initiate.
        let attach = {
            let mut registry = self.registry.lock();
            if let Some(report) = registry.fresh(&key, self.config.ttl) {
                debug!(%key, "served sandbox result from recent window");
                return report;
            }
            match registry.active.get_mut(&key) {
                Some(waiters) => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                None => {
                    registry.active.insert(key.clone(), Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = attach {
            debug!(%key, "coalesced onto active sandbox run");
            return rx.await.unwrap_or_else(|_| {
                RunReport::failed(&key, PathBuf::new(), "sandbox run abandoned")
            });
        }

        let report = match self.limiter.acquire().await {
            Ok(_permit) => self.execute(&key, code).await,
            Err(_) => RunReport::failed(&key, PathBuf::new(), "sandbox engine shut down"),
        };

        // Publish to the recent window and resolve every waiter. The oneshot
        // send is thread-safe, so waiters on other runtimes wake correctly.
        // Each insert also sweeps dead entries, keeping the window bounded
        // under a stream of unique keys.
        let ttl = self.config.ttl;
        let waiters = {
            let mut registry = self.registry.lock();
            registry.recent.retain(|_, entry| entry.1.elapsed() <= ttl);
            registry.recent.insert(key.clone(), (report.clone(), Instant::now()));
            registry.active.remove(&key).unwrap_or_default()
        };
        for waiter in waiters {
            let _ = waiter.send(report.clone());
        }

        match &report.error {
            None => info!(%key, duration_ms = report.duration_ms, "sandbox run ok"),
            Some(error) => warn!(%key, duration_ms = report.duration_ms, %error, "sandbox run failed"),
        }
        report
    }

    #[cfg(test)]
    fn recent_len(&self) -> usize {
        self.registry.lock().recent.len()
    }

    async fn execute(&self, key: &RunKey, code: &str) -> RunReport {
        let started = Instant::now();

        let (pending_path, file) =
            match logfile::allocate_pending(&self.config.log_dir, self.clock.epoch_ms()) {
            Ok(allocated) => allocated,
            Err(e) => {
                return RunReport::failed(key, PathBuf::new(), format!("log allocation failed: {e}"))
            }
        };
        let sink = Arc::new(Mutex::new(LogSink { file, lines: Vec::new() }));

        let Some((program, args)) = self.config.interpreter.split_first() else {
            let log_path = logfile::finalize(&pending_path, false).await;
            return RunReport::failed(key, log_path, "empty interpreter command");
        };

        let mut child = match Command::new(program)
            .args(args)
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let log_path = logfile::finalize(&pending_path, false).await;
                return RunReport::failed(key, log_path, format!("spawn failed: {e}"));
            }
        };

        // Stream both pipes into the shared sink as lines arrive.
        let out_task = child
            .stdout
            .take()
            .map(|stream| tokio::spawn(copy_lines(stream, Arc::clone(&sink), false)));
        let err_task = child
            .stderr
            .take()
            .map(|stream| tokio::spawn(copy_lines(stream, Arc::clone(&sink), true)));

        let mut timed_out = false;
        let mut wait_failure = None;
        let mut exit_status = None;
        match tokio::time::timeout(self.config.max_run, child.wait()).await {
            Ok(Ok(status)) => exit_status = Some(status),
            Ok(Err(e)) => wait_failure = Some(e.to_string()),
            Err(_) => {
                timed_out = true;
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }

        // Readers hit EOF once the process is gone; drain them before
        // scanning the captured output. The drain is bounded: a lingering
        // grandchild keeps the pipes open, and the report must not wait on it.
        for mut task in [out_task, err_task].into_iter().flatten() {
            if tokio::time::timeout(READER_DRAIN_LIMIT, &mut task).await.is_err() {
                task.abort();
            }
        }

        let error = {
            let sink = sink.lock();
            if timed_out {
                Some(format!("Timeout after {} ms", self.config.max_run.as_millis()))
            } else if let Some(reason) = wait_failure {
                Some(format!("wait failed: {reason}"))
            } else if let Some(status) = exit_status.filter(|s| !s.success()) {
                Some(exit_failure(status, &sink.lines))
            } else {
                detect_sentinel(&sink.lines)
            }
        };
        drop(sink);

        let log_path = logfile::finalize(&pending_path, error.is_none()).await;
        RunReport {
            key: key.clone(),
            log_path,
            duration_ms: started.elapsed().as_millis() as u64,
            error,
        }
    }
}

async fn copy_lines<R>(stream: R, sink: Arc<Mutex<LogSink>>, from_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        sink.lock().append(from_stderr, &line);
    }
}

/// Failure message for a nonzero exit: the stderr tail (usually a
/// traceback), or the bare exit code when stderr was silent.
fn exit_failure(status: std::process::ExitStatus, lines: &[CapturedLine]) -> String {
    let tail: Vec<&str> = lines
        .iter()
        .filter(|l| l.from_stderr)
        .map(|l| l.text.as_str())
        .collect();
    let tail_start = tail.len().saturating_sub(STDERR_TAIL_LINES);
    if tail.is_empty() {
        format!("exit code {}", status.code().unwrap_or(-1))
    } else {
        tail[tail_start..].join("\n")
    }
}

/// Scan captured output for a recognizable error marker printed without a
/// raised exception.
fn detect_sentinel(lines: &[CapturedLine]) -> Option<String> {
    lines
        .iter()
        .find(|l| {
            l.text.trim_start().starts_with(SENTINEL_ERROR_PREFIX)
                || l.text.contains(SENTINEL_TRACEBACK)
        })
        .map(|l| l.text.clone())
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
