// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ov-core: shared leaf types for the Overseer agent runtime.
//!
//! Everything here is consumed by the cache, sandbox, and runtime crates:
//! the testable clock, environment configuration, request fingerprints,
//! priority classification, and the global shutdown/throttle signals.

pub mod clock;
pub mod config;
pub mod fingerprint;
pub mod priority;
pub mod shutdown;
pub mod throttle;

pub use clock::{Clock, FakeClock, SystemClock};
pub use fingerprint::{fingerprint, structural_key};
pub use priority::{classify, next_seq, Classified, Priority};
pub use shutdown::Shutdown;
pub use throttle::Throttle;
