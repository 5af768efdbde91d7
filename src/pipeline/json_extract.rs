//! Pulling structured data out of free-text model replies.
//!
//! Models wrap their JSON in prose or markdown fences. We locate the first
//! balanced `{...}` (ignoring braces inside string literals) and parse it
//! strictly into the expected shape; anything else is a soft `Parse` error
//! for the caller to absorb at the item boundary.

use serde::de::DeserializeOwned;

use crate::error::{PipelineError, Result};

/// Return the first balanced JSON object embedded in `text`, if any.
pub fn first_json_object(text: &str) -> Option<&str> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = matching_brace(&text[start..]) {
            return Some(&text[start..start + end + 1]);
        }
        search_from = start + 1;
    }
    None
}

/// Byte index of the brace closing the one at position 0, string-aware.
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the first JSON object in `text` into `T`.
pub fn parse_first_object<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = first_json_object(text).ok_or_else(|| {
        PipelineError::Parse(format!("no JSON object in reply: {}", preview(text)))
    })?;
    serde_json::from_str(json)
        .map_err(|e| PipelineError::Parse(format!("{}: {}", e, preview(json))))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
