// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run log files.
//!
//! A run logs to `pending_<timestamp>.log` while active and is renamed to
//! `ok_<timestamp>.log` or `error_<timestamp>.log` on completion, so a
//! directory listing shows outcomes at a glance. The rename is retried a
//! bounded number of times to ride out transient file-lock contention.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

const RENAME_ATTEMPTS: u32 = 5;
const RENAME_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Create a fresh `pending_<timestamp>.log` in `dir`.
///
/// Bumps the timestamp on collision so two runs started in the same
/// millisecond get distinct files.
pub fn allocate_pending(dir: &Path, epoch_ms: u64) -> std::io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let mut ts = epoch_ms;
    loop {
        let path = dir.join(format!("pending_{ts}.log"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => ts += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Rename a pending log to its `ok_`/`error_` final name.
///
/// Best-effort: after the retry budget is spent the pending path is returned
/// unchanged rather than failing the run.
pub async fn finalize(pending: &Path, success: bool) -> PathBuf {
    let prefix = if success { "ok_" } else { "error_" };
    let Some(name) = pending.file_name().and_then(|n| n.to_str()) else {
        return pending.to_path_buf();
    };
    let final_name = match name.strip_prefix("pending_") {
        Some(rest) => format!("{prefix}{rest}"),
        None => format!("{prefix}{name}"),
    };
    let target = pending.with_file_name(final_name);

    for attempt in 1..=RENAME_ATTEMPTS {
        match std::fs::rename(pending, &target) {
            Ok(()) => return target,
            Err(e) if attempt < RENAME_ATTEMPTS => {
                warn!(attempt, error = %e, path = %pending.display(), "log rename failed, retrying");
                tokio::time::sleep(RENAME_RETRY_DELAY).await;
            }
            Err(e) => {
                warn!(error = %e, path = %pending.display(), "log rename failed, keeping pending name");
            }
        }
    }
    pending.to_path_buf()
}

#[cfg(test)]
#[path = "logfile_tests.rs"]
mod tests;
