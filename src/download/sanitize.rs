//! Filename sanitization.
//!
//! Turns titles reported by a remote source into a single path segment that
//! is safe on POSIX and Windows filesystems.

use regex::Regex;
use std::sync::LazyLock;

/// Characters no common filesystem accepts in a file name.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Default maximum length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 100;

/// Longest file name, in bytes, that ext4, APFS and NTFS all accept.
pub const MAX_NAME_BYTES: usize = 255;

/// Returned for empty or degenerate input.
pub const PLACEHOLDER: &str = "unknown";

/// Substitute for forbidden characters and whitespace runs.
const SUBSTITUTE: char = '_';

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex"));

/// Sanitize `raw` into a filename part of at most `max_length` characters
/// and [`MAX_NAME_BYTES`] bytes.
///
/// Whitespace runs collapse to a single underscore, forbidden and control
/// characters become underscores, and trailing dots are removed. Input that
/// leaves nothing usable maps to [`PLACEHOLDER`] (cut to `max_length` too).
/// The function is idempotent.
pub fn sanitize(raw: &str, max_length: usize) -> String {
    sanitize_bounded(raw, max_length, MAX_NAME_BYTES)
}

/// [`sanitize`] with an explicit UTF-8 byte budget as well as a character limit.
///
/// The byte cut always lands on a character boundary.
pub fn sanitize_bounded(raw: &str, max_chars: usize, max_bytes: usize) -> String {
    let max_chars = max_chars.max(1);
    let max_bytes = max_bytes.max(1);
    let trimmed = raw.trim();
    let collapsed = WHITESPACE_RUN.replace_all(trimmed, SUBSTITUTE.to_string().as_str());

    let replaced: String = collapsed
        .chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                SUBSTITUTE
            } else {
                c
            }
        })
        .take(max_chars)
        .collect();

    // Windows drops trailing dots, and "." / ".." are not names.
    let cleaned = truncate_bytes(&replaced, max_bytes).trim_end_matches('.');

    if cleaned.is_empty() {
        PLACEHOLDER.chars().take(max_chars.min(max_bytes)).collect()
    } else {
        cleaned.to_string()
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// [`sanitize`] with the default maximum length.
pub fn sanitize_default(raw: &str) -> String {
    sanitize(raw, DEFAULT_MAX_LENGTH)
}
