// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable fingerprints for cacheable operations.
//!
//! A fingerprint hashes every semantically relevant input to a call so that
//! identical requests land on the same cache entry. `structural_key` extends
//! this to code text: snippets that differ only in comments or whitespace
//! hash to the same key and therefore coalesce to the same sandbox run.

use sha2::{Digest, Sha256};

/// Hash a sequence of input parts into a stable hex fingerprint.
///
/// Each part is length-prefixed before hashing so `["ab", "c"]` and
/// `["a", "bc"]` cannot collide.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex(&hasher.finalize())
}

/// Structural key for a piece of code.
///
/// Normalizes away everything that does not change what the code does:
/// comments, blank lines, trailing whitespace, and the width of leading
/// indentation runs. Nesting depth is preserved (one marker per enclosing
/// block) so reindented snippets coalesce but a dedented line does not.
pub fn structural_key(code: &str) -> String {
    let mut normalized = String::with_capacity(code.len());
    // Indent widths of the currently open blocks, innermost last.
    let mut open_blocks: Vec<usize> = Vec::new();
    for line in code.lines() {
        let stripped = strip_comment(line);
        let body = stripped.trim();
        if body.is_empty() {
            continue;
        }
        let width = stripped.len() - stripped.trim_start().len();
        while open_blocks.last().is_some_and(|&block| width < block) {
            open_blocks.pop();
        }
        if width > open_blocks.last().copied().unwrap_or(0) {
            open_blocks.push(width);
        }
        for _ in 0..open_blocks.len() {
            normalized.push('\t');
        }
        normalized.push_str(body);
        normalized.push('\n');
    }
    fingerprint(&[&normalized])
}

/// Strip a trailing `#` comment, respecting single- and double-quoted strings.
fn strip_comment(line: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;
    for (i, c) in line.char_indices() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '#' if !in_single && !in_double => return &line[..i],
            _ => {}
        }
    }
    line
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
#[path = "fingerprint_tests.rs"]
mod tests;
