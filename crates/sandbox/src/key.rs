// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural run keys.
//!
//! Two textually different but structurally identical snippets (differing
//! only in comments or whitespace) map to the same key and therefore share
//! one sandbox run.

use std::fmt;

use ov_core::structural_key;

/// Structural hash identifying a sandbox run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey(String);

impl RunKey {
    pub fn for_code(code: &str) -> Self {
        Self(structural_key(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Log-friendly short form
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
