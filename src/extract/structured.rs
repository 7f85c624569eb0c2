//! Structured-metadata promotion.
//!
//! Product pages often carry better data in embedded JSON than in visible
//! markup: JSON-LD `Product` blocks, storefront `BCData` blobs, and
//! description meta tags with spec-shaped phrases. Everything promoted here
//! fills absent keys only; visible markup always wins.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::model::ExtractedProduct;

/// Locate a JSON-LD `Product` object in the document, descending into
/// `@graph` arrays when present.
#[must_use]
pub fn find_json_ld_product(document: &Html) -> Option<Value> {
    let selector = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

    for script in document.select(&selector) {
        let text: String = script.text().collect();
        let Ok(json) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };

        if let Some(product) = pick_product(&json) {
            return Some(product.clone());
        }
    }
    None
}

fn pick_product(json: &Value) -> Option<&Value> {
    let is_product = |v: &Value| {
        v.get("@type")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case("product"))
    };

    match json {
        Value::Object(_) if is_product(json) => Some(json),
        Value::Object(obj) => obj
            .get("@graph")
            .and_then(Value::as_array)
            .and_then(|graph| graph.iter().find(|v| is_product(v))),
        Value::Array(items) => items.iter().find(|v| is_product(v)),
        _ => None,
    }
}

/// Best-effort percent-decode. Returns the input unchanged when it does not
/// decode cleanly as UTF-8.
#[must_use]
pub fn percent_decode(text: &str) -> String {
    if !text.contains('%') {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &text[i + 1..i + 3];
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| text.to_string())
}

/// Extract a `window`-style JS object assignment (`NAME = { … }`) using a
/// balanced-brace scan that respects strings and escapes.
#[must_use]
pub fn extract_js_object(html: &str, var_name: &str) -> Option<Value> {
    let marker_pos = html.find(var_name)?;
    let after_marker = &html[marker_pos + var_name.len()..];

    let trimmed = after_marker.trim_start();
    let rest = trimmed.strip_prefix('=')?.trim_start();
    if !rest.starts_with('{') {
        return None;
    }

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;
    let mut end_pos = None;

    for (i, ch) in rest.char_indices() {
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
                    end_pos = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    serde_json::from_str(&rest[..end_pos?]).ok()
}

/// Promote fields from an embedded `BCData` storefront blob.
///
/// Fills `Weight` and `SKU` from `product_attributes` when those keys are
/// not already present.
pub fn promote_bcdata(html: &str, product: &mut ExtractedProduct) {
    let Some(data) = extract_js_object(html, "BCData") else {
        return;
    };
    debug!("found embedded BCData blob");

    let attributes = data.get("product_attributes");

    if !product.specs.contains_key("Weight") {
        if let Some(weight) = attributes
            .and_then(|a| a.get("weight"))
            .and_then(|w| w.get("formatted"))
            .and_then(Value::as_str)
        {
            product.push_spec("Weight", weight);
        }
    }

    if !product.specs.contains_key("SKU") {
        if let Some(sku) = attributes.and_then(|a| a.get("sku")).and_then(Value::as_str) {
            product.push_spec("SKU", sku);
        }
    }
}

static VOLTAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b120\s*/\s*240\s*V(?:AC)?\b").unwrap());
static PHASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsingle[\s-]?phase\b|\b1[\s-]?phase\b").unwrap());
static SERVICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b200\s*A\b").unwrap());
static DOWNLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bdownline\b|\bsub[\s-]?panel\b").unwrap());
static SURGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bsurge\s+protection\b").unwrap());

/// Deterministic spec promoter over description metadata.
///
/// Tuned for surge-protection-device description text; phrases outside that
/// domain simply never match, and existing keys are never overwritten.
pub fn promote_description_specs(description: &str, product: &mut ExtractedProduct) {
    let mut fill = |key: &str, value: &str| {
        if !product.specs.contains_key(key) {
            product.push_spec(key, value);
        }
    };

    if VOLTAGE_RE.is_match(description) {
        fill("System Voltage", "120/240 V");
    }
    if PHASE_RE.is_match(description) {
        fill("Phase", "Single Phase");
    }
    if SERVICE_RE.is_match(description) {
        fill("Max Service Size", "200 A");
    }
    if DOWNLINE_RE.is_match(description) {
        fill("Application", "Downline / Sub-panel Protection");
    }
    if SURGE_RE.is_match(description) {
        fill("Product Type", "Surge Protection Device");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;

    fn empty_product() -> ExtractedProduct {
        ExtractedProduct::new("M1-1120-3", "SurgePure", "https://x.com", SourceType::Unknown)
    }

    #[test]
    fn json_ld_product_found_in_graph() {
        let html = Html::parse_document(
            r#"<html><head><script type="application/ld+json">
            {"@graph":[{"@type":"WebSite"},{"@type":"Product","description":"An SPD","brand":{"name":"SurgePure"}}]}
            </script></head></html>"#,
        );
        let product = find_json_ld_product(&html).unwrap();
        assert_eq!(
            product.get("description").and_then(Value::as_str),
            Some("An SPD")
        );
    }

    #[test]
    fn percent_decode_round_trips() {
        assert_eq!(percent_decode("Surge%20Protection%20Device"), "Surge Protection Device");
        assert_eq!(percent_decode("plain text"), "plain text");
        assert_eq!(percent_decode("broken %zz stays"), "broken %zz stays");
    }

    #[test]
    fn js_object_scan_handles_nested_braces_and_strings() {
        let html = r#"<script>var BCData = {"a":{"b":"closing } in string"},"c":1};</script>"#;
        let value = extract_js_object(html, "BCData").unwrap();
        assert_eq!(value.get("c").and_then(Value::as_i64), Some(1));
    }

    #[test]
    fn bcdata_fills_absent_keys_only() {
        let html = r#"<script>var BCData = {"product_attributes":{"sku":"M1-1120-3","weight":{"formatted":"12 lb"}}};</script>"#;
        let mut product = empty_product();
        product.push_spec("Weight", "11 lb");
        promote_bcdata(html, &mut product);
        assert_eq!(product.specs.get("Weight").map(String::as_str), Some("11 lb"));
        assert_eq!(product.specs.get("SKU").map(String::as_str), Some("M1-1120-3"));
    }

    #[test]
    fn description_promoter_extracts_spec_phrases() {
        let description = "Single-phase surge protection for 120/240V systems up to 200 A, \
                           ideal for downline panels.";
        let mut product = empty_product();
        promote_description_specs(description, &mut product);
        assert_eq!(
            product.specs.get("System Voltage").map(String::as_str),
            Some("120/240 V")
        );
        assert_eq!(product.specs.get("Phase").map(String::as_str), Some("Single Phase"));
        assert_eq!(
            product.specs.get("Max Service Size").map(String::as_str),
            Some("200 A")
        );
        assert_eq!(
            product.specs.get("Application").map(String::as_str),
            Some("Downline / Sub-panel Protection")
        );
        assert_eq!(
            product.specs.get("Product Type").map(String::as_str),
            Some("Surge Protection Device")
        );
    }

    #[test]
    fn description_promoter_never_overwrites() {
        let mut product = empty_product();
        product.push_spec("Phase", "Three Phase");
        promote_description_specs("single phase unit", &mut product);
        assert_eq!(product.specs.get("Phase").map(String::as_str), Some("Three Phase"));
    }
}
