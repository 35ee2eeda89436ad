//! JSON-in-text extraction
//!
//! Completion providers wrap JSON replies in markdown fences and prose. A
//! naive "first `{` to last `}`" substring breaks on nested braces and on
//! braces inside string values, so this is a small explicit state machine:
//! one left-to-right scan tracking brace depth, whether the cursor is
//! inside a quoted string, and whether the previous character was an
//! unconsumed escape. The balanced substring then goes to a strict parser.

use serde_json::Value;
use thiserror::Error;

/// Error types for extraction failures
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON object found in text")]
    NotFound,

    #[error("invalid JSON: {0}")]
    Invalid(String),
}

/// Locate and parse the first balanced JSON object embedded in `text`.
///
/// If no `{` is found, or the scan never returns to zero depth, the whole
/// trimmed input is handed to the strict parser as a last resort. Failures
/// come back as [`ExtractError`]; this never panics and never loops.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    if let Some(candidate) = balanced_object(text) {
        return serde_json::from_str(candidate).map_err(|e| ExtractError::Invalid(e.to_string()));
    }

    // No balanced object: maybe the input is bare JSON (possibly not an
    // object at all, e.g. a top-level array).
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractError::NotFound);
    }
    serde_json::from_str(trimmed).map_err(|_| ExtractError::NotFound)
}

/// The substring spanning the first balanced `{ ... }`, or `None`.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            // The escaped character is consumed as-is; it can neither open
            // a new escape nor toggle string state.
            escaped = false;
            continue;
        }
        if ch == '\\' && in_string {
            escaped = true;
            continue;
        }
        if ch == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + ch.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    // Ran out of input before the depth returned to zero.
    None
}
