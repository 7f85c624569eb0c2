//! Spec-table reconstruction from repaired datasheet text.
//!
//! Multi-model datasheets print one spec table with a model column per
//! variant. After column repair the table survives as a `Model Number`
//! header line followed by label+values rows. This module detects the
//! model set, walks the table, and captures the prose that surrounds it.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{EnrichError, Result};
use crate::pdf::repair::{self, MODEL_TOKEN_RE};

/// Minimum raw spec rows for a parse to count as successful.
pub const MIN_SPEC_ROWS: usize = 18;

/// One reconstructed table row: repaired label plus the full right-hand
/// column string (all models' values, un-split).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawSpecRow {
    pub key: String,
    pub raw: String,
}

/// Everything recovered from one datasheet.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatasheetParse {
    pub detected_models: Vec<String>,
    pub raw_rows: Vec<RawSpecRow>,
    pub features: Vec<String>,
    pub overview_text: String,
    pub sidebar_bullets: Vec<String>,
    pub raw_text: String,
}

static SPACED_MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{1,3}\d?)\s+(\d{3,4})\s+(\d)\b").unwrap());
static HEADER_ADJACENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)MODEL\s+NUMBER[S]?\s*:?\s*([A-Z]{1,3}\d?[-\s]\d{3,4}[-\s]\d)").unwrap()
});

/// Detect model identifiers in three shapes and canonicalize them all to
/// hyphenated form.
#[must_use]
pub fn detect_models(text: &str) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    let mut push = |model: String| {
        if !models.contains(&model) {
            models.push(model);
        }
    };

    for m in MODEL_TOKEN_RE.find_iter(text) {
        push(m.as_str().to_string());
    }
    for caps in SPACED_MODEL_RE.captures_iter(text) {
        push(format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]));
    }
    for caps in HEADER_ADJACENT_RE.captures_iter(text) {
        push(caps[1].replace(' ', "-"));
    }

    models
}

/// Table-closing sentinels: section headings that follow the spec table.
fn is_table_sentinel(line: &str) -> bool {
    let upper = line.trim().to_uppercase();
    upper.starts_with("KEY FEATURES")
        || upper.starts_with("APPLICABLE STANDARDS")
        || upper.starts_with("STANDARDS")
        || upper.starts_with("AGENCY LISTINGS")
        || upper.starts_with("PAGE ")
        || upper.starts_with("WWW.")
}

/// A `Model Number` line carrying at least two model tokens opens the
/// spec table.
fn opens_table(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.to_lowercase().starts_with("model number") {
        return false;
    }
    MODEL_TOKEN_RE.find_iter(trimmed).count() >= 2
}

const OVERVIEW_TERMS: [&str; 6] = ["surge", "spd", "isolates", "downline", "equipment", "panels"];
const CALLOUT_TERMS: [&str; 5] = ["spd", "sccr", "kaic", "type 1", "type 2"];

fn is_overview_line(line: &str) -> bool {
    if line.len() <= 50 {
        return false;
    }
    let lower = line.to_lowercase();
    OVERVIEW_TERMS.iter().any(|t| lower.contains(t))
}

fn is_sidebar_callout(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.ends_with('!') {
        return false;
    }
    let lower = trimmed.to_lowercase();
    CALLOUT_TERMS.iter().any(|t| lower.contains(t))
}

fn looks_like_heading(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.len() > 3
        && trimmed.chars().all(|c| !c.is_lowercase())
        && trimmed.chars().any(|c| c.is_alphabetic())
}

/// Collect bullet features between `KEY FEATURES` and the next section.
///
/// Continuation lines (indented or starting lowercase) fold into the
/// preceding bullet so one feature stays one string.
fn collect_features(lines: &[&str]) -> Vec<String> {
    let Some(start) = lines
        .iter()
        .position(|l| l.trim().to_uppercase().starts_with("KEY FEATURES"))
    else {
        return Vec::new();
    };

    let mut features: Vec<String> = Vec::new();
    for line in &lines[start + 1..] {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if looks_like_heading(trimmed) && !trimmed.starts_with('•') {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix('•').or_else(|| trimmed.strip_prefix('-')) {
            features.push(rest.trim().to_string());
        } else if let Some(last) = features.last_mut() {
            let continuation = line.starts_with(char::is_whitespace)
                || trimmed.starts_with(char::is_lowercase);
            if continuation {
                last.push(' ');
                last.push_str(trimmed);
            } else {
                break;
            }
        }
    }

    let mut deduped = Vec::new();
    for feature in features {
        if !feature.is_empty() && !deduped.contains(&feature) {
            deduped.push(feature);
        }
    }
    deduped
}

/// Parse repaired datasheet text into the structured datasheet shape.
///
/// Errors when fewer than [`MIN_SPEC_ROWS`] rows survive; below that the
/// table reconstruction cannot be trusted.
pub fn parse_datasheet_text(raw: &str) -> Result<DatasheetParse> {
    let normalized = repair::normalize_text(raw);
    let repaired = repair::repair_columns(&normalized);
    let lines: Vec<&str> = repaired.lines().collect();

    let detected_models = detect_models(&repaired);

    let mut raw_rows: Vec<RawSpecRow> = Vec::new();
    let mut overview_lines: Vec<String> = Vec::new();
    let mut sidebar_bullets: Vec<String> = Vec::new();
    let mut in_table = false;

    for line in &lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if !in_table && opens_table(trimmed) {
            in_table = true;
            continue;
        }

        if in_table {
            if is_table_sentinel(trimmed) {
                in_table = false;
                continue;
            }
            if let Some((key, raw_value)) = repair::split_spec_row(trimmed) {
                raw_rows.push(RawSpecRow { key, raw: raw_value });
            }
            continue;
        }

        if is_sidebar_callout(trimmed) {
            let bullet = trimmed.to_string();
            if !sidebar_bullets.contains(&bullet) {
                sidebar_bullets.push(bullet);
            }
        } else if is_overview_line(trimmed) {
            overview_lines.push(trimmed.to_string());
        }
    }

    if raw_rows.len() < MIN_SPEC_ROWS {
        return Err(EnrichError::PdfRowUnderflow {
            rows: raw_rows.len(),
            minimum: MIN_SPEC_ROWS,
        });
    }

    Ok(DatasheetParse {
        detected_models,
        features: collect_features(&lines),
        overview_text: overview_lines.join(" "),
        sidebar_bullets,
        raw_rows,
        raw_text: repaired,
    })
}
