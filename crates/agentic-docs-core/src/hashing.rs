//! Content hashing for change detection.
//!
//! A symbol's `content_hash` is the SHA-256 hex digest of the literal text
//! of its line span. Edits outside the span leave the hash untouched, which
//! is what lets a regenerated document section be matched against the
//! exact source that produced it.

use sha2::{Digest, Sha256};

/// SHA-256 of `text`, lowercase hex.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lines `start..=end` (1-based) of `text`, joined with `\n`.
///
/// Out-of-range spans are clamped to the available lines; an inverted span
/// yields an empty string.
pub fn line_span(text: &str, start: usize, end: usize) -> String {
    let first = start.max(1);
    if end < first {
        return String::new();
    }
    text.lines()
        .skip(first - 1)
        .take(end - first + 1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Hash of the `start..=end` line span of `text`.
pub fn span_hash(text: &str, start: usize, end: usize) -> String {
    sha256_hex(&line_span(text, start, end))
}
