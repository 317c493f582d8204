// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ov-sandbox: isolated code execution with coalescing.
//!
//! Code runs in a separate worker process with interleaved output capture to
//! a per-run log file and a hard wall-clock timeout. Structurally identical
//! submissions coalesce onto one running process, and a short TTL serves
//! repeats that arrive just after a run finished. Exceptions, timeouts, and
//! sentinel error lines in the output all surface through the same
//! `RunReport::error` shape.

pub mod engine;
pub mod key;
pub mod logfile;

pub use engine::{RunReport, SandboxConfig, SandboxEngine};
pub use key::RunKey;
