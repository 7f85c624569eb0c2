//! Tolerant JSON extraction from LLM responses.
//!
//! Models wrap JSON in prose, code fences, and BOMs, and occasionally emit
//! bare words inside arrays. The extractor strips the wrapping, locates the
//! first balanced JSON object, and retries once with bare-word sanitation
//! before giving up.

use serde_json::Value;

use crate::error::{EnrichError, Result};

/// Strip a UTF-8 BOM and any Markdown code fences around the payload.
fn strip_wrapping(text: &str) -> &str {
    let text = text.trim_start_matches('\u{feff}').trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the info string (`json`, `javascript`, …) up to the newline.
        let body = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        return body.rsplit_once("```").map_or(body, |(inner, _)| inner).trim();
    }
    text
}

/// Locate the first complete `{…}` object with a balanced-brace scan that
/// respects strings and escapes.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let candidate = &text[start..];

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in candidate.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&candidate[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Quote bare-word tokens that appear where array elements should be.
///
/// Turns `["ok", partial, "done"]` into `["ok", "partial", "done"]`. Only
/// array contexts are touched; object keys and values with bare words are
/// beyond salvage.
fn sanitize_bare_words(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escape_next = false;
    let mut array_depth = 0usize;
    // Last significant (non-whitespace) char outside strings; a bare word
    // only starts an array element right after `[` or `,`.
    let mut last_sig = '\0';
    let mut chars = json.chars().peekable();

    while let Some(ch) = chars.next() {
        if escape_next {
            escape_next = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' if in_string => {
                escape_next = true;
                out.push(ch);
            }
            '"' => {
                in_string = !in_string;
                last_sig = ch;
                out.push(ch);
            }
            '[' if !in_string => {
                array_depth += 1;
                last_sig = ch;
                out.push(ch);
            }
            ']' if !in_string => {
                array_depth = array_depth.saturating_sub(1);
                last_sig = ch;
                out.push(ch);
            }
            c if !in_string
                && array_depth > 0
                && matches!(last_sig, '[' | ',')
                && (c.is_alphabetic() || c == '_') =>
            {
                // Collect the bare word and decide whether to quote it.
                let mut word = String::new();
                word.push(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '-' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "true" | "false" | "null" => out.push_str(&word),
                    _ => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                }
                last_sig = '"';
            }
            c => {
                if !in_string && !c.is_whitespace() {
                    last_sig = c;
                }
                out.push(c);
            }
        }
    }
    out
}

/// Extract and parse the first JSON object in an LLM response.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let stripped = strip_wrapping(text);
    let candidate = first_balanced_object(stripped)
        .ok_or_else(|| EnrichError::LlmParse("no JSON object found in response".to_string()))?;

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            let sanitized = sanitize_bare_words(candidate);
            serde_json::from_str(&sanitized).map_err(|_| {
                EnrichError::LlmParse(format!("invalid JSON after sanitation: {first_err}"))
            })
        }
    }
}
