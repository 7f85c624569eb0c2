//! Evidence normalization.
//!
//! Merges the extracted products for one MPN into a single view: alias-
//! canonicalized spec keys, confidence-weighted value precedence with full
//! source provenance, flattened images/datasheets/verbatim text, and the
//! Remote-Alarm variant overlay.

pub mod aliases;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{EnrichError, Result};
use crate::model::{
    split_ra_variant, ExtractedProduct, MergedSpec, NormalizedProduct, SourceType, VerbatimSection,
};

/// Confidence assigned to a locally cached datasheet record.
pub const DATASHEET_CONFIDENCE: f64 = 0.95;
/// Confidence of the RA variant overlay entries.
pub const RA_OVERLAY_CONFIDENCE: f64 = 0.95;

/// Source tag recorded for RA overlay entries.
pub const RA_SOURCE_TAG: &str = "variant:RA";

const RA_VERBATIM_TEXT: &str = "Includes remote alarm for system monitoring.";

/// Wrap a cached datasheet JSON blob as a pipeline evidence record and
/// prepend it, unless the inputs already carry datasheet evidence.
pub fn inject_datasheet(
    products: &mut Vec<ExtractedProduct>,
    mpn: &str,
    manufacturer: &str,
    blob: Value,
) {
    if products
        .iter()
        .any(|p| p.source_type == SourceType::Datasheet)
    {
        return;
    }
    debug!(mpn, "injecting cached datasheet evidence");

    let mut product = ExtractedProduct::new(
        mpn,
        manufacturer,
        &format!("datasheet:{mpn}"),
        SourceType::Datasheet,
    );
    product.confidence = DATASHEET_CONFIDENCE;
    product.raw_datasheet = Some(blob);
    products.insert(0, product);
}

/// `nominal_ac_line_voltage_vrms_raw` → `Nominal Ac Line Voltage Vrms`.
fn humanize_key(raw_key: &str) -> String {
    let stripped = raw_key.strip_suffix("_raw").unwrap_or(raw_key);
    stripped
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(if *b { "Yes" } else { "No" }.to_string()),
        _ => None,
    }
}

/// Pull a text field that may be a bare string or nested under `text`/`raw`.
fn flexible_text(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => value_to_text(value),
        Value::Object(obj) => obj
            .get("text")
            .or_else(|| obj.get("raw"))
            .and_then(value_to_text),
        _ => None,
    }
}

/// Bullet lists appear flat or nested under several field names.
fn flexible_bullets(value: &Value) -> Vec<String> {
    let array = match value {
        Value::Array(items) => Some(items),
        Value::Object(obj) => ["raw_bullets", "bullets", "items", "raw"]
            .iter()
            .find_map(|field| obj.get(*field))
            .and_then(Value::as_array),
        _ => None,
    };
    array
        .map(|items| items.iter().filter_map(flexible_text).collect())
        .unwrap_or_default()
}

const DATASHEET_SPEC_GROUPS: [&str; 3] =
    ["electrical_specs", "mechanical_specs", "safety_and_compliance"];

/// Flatten a raw datasheet blob into the product's spec map and verbatim
/// sections. Tolerates both the legacy flat shape and the nested one.
pub fn preprocess_datasheet_product(product: &mut ExtractedProduct) {
    let Some(raw) = product.raw_datasheet.clone() else {
        return;
    };

    for group in DATASHEET_SPEC_GROUPS {
        let Some(specs) = raw.get(group).and_then(Value::as_object) else {
            continue;
        };
        for (key, value) in specs {
            if let Some(text) = value_to_text(value) {
                product.push_spec(&humanize_key(key), &text);
            }
        }
    }

    if let Some(text) = raw.get("overview").and_then(flexible_text) {
        product
            .verbatim_sections
            .push(VerbatimSection::new(Some("Overview"), text));
    }
    if let Some(text) = raw.get("system_description").and_then(flexible_text) {
        product
            .verbatim_sections
            .push(VerbatimSection::new(Some("System Description"), text));
    }
    if let Some(features) = raw.get("key_features") {
        for bullet in flexible_bullets(features) {
            product
                .verbatim_sections
                .push(VerbatimSection::new(Some("Key Feature"), bullet));
        }
    }
}

fn merge_spec(
    merged: &mut std::collections::BTreeMap<String, MergedSpec>,
    key: &str,
    value: &str,
    source: &str,
    confidence: f64,
) {
    let canonical = aliases::canonicalize(key);
    match merged.get_mut(&canonical) {
        None => {
            merged.insert(
                canonical,
                MergedSpec {
                    value: value.to_string(),
                    sources: vec![source.to_string()],
                    confidence,
                },
            );
        }
        Some(entry) => {
            if confidence > entry.confidence {
                entry.value = value.to_string();
                entry.confidence = confidence;
            }
            if !entry.sources.iter().any(|s| s == source) {
                entry.sources.push(source.to_string());
            }
        }
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !item.is_empty() && !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

/// Merge evidence from all sources into one normalized product.
///
/// Errors on empty input. For every spec key the retained value comes from
/// the highest-confidence source, and every contributing source URL is
/// kept. Running twice over the same input yields the same output.
pub fn normalize(
    products: &[ExtractedProduct],
    canonical_mpn: Option<&str>,
) -> Result<NormalizedProduct> {
    if products.is_empty() {
        return Err(EnrichError::NoEvidence);
    }

    let requested_mpn = canonical_mpn.unwrap_or(&products[0].mpn);
    let (_, is_ra_variant) = split_ra_variant(requested_mpn);

    let manufacturer = products
        .iter()
        .map(|p| p.manufacturer.as_str())
        .find(|m| !m.is_empty())
        .unwrap_or_default()
        .to_string();

    // Datasheet blobs flatten before the merge so their specs participate.
    let mut products: Vec<ExtractedProduct> = products.to_vec();
    for product in &mut products {
        if product.raw_datasheet.is_some() {
            preprocess_datasheet_product(product);
        }
    }

    let mut specs = std::collections::BTreeMap::new();
    let mut images = Vec::new();
    let mut datasheets = Vec::new();
    let mut source_urls = Vec::new();
    let mut verbatim_sections: Vec<VerbatimSection> = Vec::new();

    for product in &products {
        for (key, value) in &product.specs {
            merge_spec(&mut specs, key, value, &product.source_url, product.confidence);
        }
        for image in &product.images {
            push_unique(&mut images, image);
        }
        for datasheet in &product.datasheets {
            push_unique(&mut datasheets, datasheet);
        }
        push_unique(&mut source_urls, &product.source_url);
        for section in &product.verbatim_sections {
            let mut section = section.clone();
            section.source.get_or_insert_with(|| product.source_url.clone());
            if !verbatim_sections.contains(&section) {
                verbatim_sections.push(section);
            }
        }
    }

    if is_ra_variant {
        merge_spec(
            &mut specs,
            "Remote Alarm",
            "Yes",
            RA_SOURCE_TAG,
            RA_OVERLAY_CONFIDENCE,
        );
        let variant_section = VerbatimSection {
            heading: Some("Variant".to_string()),
            text: RA_VERBATIM_TEXT.to_string(),
            source: Some(RA_SOURCE_TAG.to_string()),
        };
        if !verbatim_sections.contains(&variant_section) {
            verbatim_sections.push(variant_section);
        }
    }

    // Title: the OEM's wording wins, then any source that offered one.
    let canonical_title = products
        .iter()
        .filter(|p| p.source_type == SourceType::Oem)
        .find_map(|p| p.canonical_title.clone())
        .or_else(|| products.iter().find_map(|p| p.canonical_title.clone()))
        .unwrap_or_else(|| format!("{manufacturer} {requested_mpn}").trim().to_string());

    let overall_confidence =
        products.iter().map(|p| p.confidence).sum::<f64>() / products.len() as f64;

    info!(
        mpn = requested_mpn,
        sources = products.len(),
        specs = specs.len(),
        ra = is_ra_variant,
        "normalized evidence"
    );

    Ok(NormalizedProduct {
        mpn: requested_mpn.to_string(),
        manufacturer,
        canonical_title,
        specs,
        verbatim_sections,
        images,
        datasheets,
        source_urls,
        overall_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(
        source_url: &str,
        source_type: SourceType,
        confidence: f64,
        specs: &[(&str, &str)],
    ) -> ExtractedProduct {
        let mut p = ExtractedProduct::new("M1-1120-3", "SurgePure", source_url, source_type);
        p.confidence = confidence;
        for (k, v) in specs {
            p.push_spec(k, v);
        }
        p
    }

    #[test]
    fn empty_input_errors() {
        assert!(matches!(normalize(&[], None), Err(EnrichError::NoEvidence)));
    }

    #[test]
    fn higher_confidence_source_wins_value_but_sources_union() {
        let low = product(
            "https://dist.example.com/m1",
            SourceType::Distributor,
            0.5,
            &[("Voltage", "120 V")],
        );
        let high = product(
            "https://surgepure.com/m1",
            SourceType::Oem,
            0.9,
            &[("System Voltage", "120/240 V")],
        );

        let normalized = normalize(&[low, high], None).unwrap();
        let merged = normalized.specs.get("Nominal AC Line Voltage (VRMS)").unwrap();
        assert_eq!(merged.value, "120/240 V");
        assert!((merged.confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(merged.sources.len(), 2);
    }

    #[test]
    fn equal_confidence_keeps_first_value() {
        let first = product("https://a.com", SourceType::Unknown, 0.7, &[("Weight", "12 lb")]);
        let second = product("https://b.com", SourceType::Unknown, 0.7, &[("Weight", "13 lb")]);
        let normalized = normalize(&[first, second], None).unwrap();
        assert_eq!(normalized.specs.get("Weight").unwrap().value, "12 lb");
    }

    #[test]
    fn merged_confidence_is_max_of_contributors() {
        let products = [
            product("https://a.com", SourceType::Unknown, 0.4, &[("Warranty", "5 yr")]),
            product("https://b.com", SourceType::Unknown, 0.8, &[("Warranty", "10 yr")]),
            product("https://c.com", SourceType::Unknown, 0.6, &[("Warranty", "7 yr")]),
        ];
        let normalized = normalize(&products, None).unwrap();
        let merged = normalized.specs.get("Warranty").unwrap();
        assert!((merged.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(merged.value, "10 yr");
        assert_eq!(merged.sources.len(), 3);
    }

    #[test]
    fn normalize_is_idempotent() {
        let products = vec![
            product(
                "https://surgepure.com/m1",
                SourceType::Oem,
                0.9,
                &[("System Voltage", "120/240 V"), ("Warranty", "10 yr")],
            ),
            product(
                "https://dist.example.com/m1",
                SourceType::Distributor,
                0.6,
                &[("Voltage", "120 V"), ("Weight", "12 lb")],
            ),
        ];
        let first = normalize(&products, Some("M1-1120-3RA")).unwrap();
        let second = normalize(&products, Some("M1-1120-3RA")).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn ra_overlay_injects_once() {
        let products = vec![product(
            "https://surgepure.com/m1",
            SourceType::Oem,
            0.9,
            &[("Voltage", "120 V")],
        )];
        let normalized = normalize(&products, Some("M1-1120-3RA")).unwrap();

        let alarm = normalized.specs.get("Remote Alarm").unwrap();
        assert_eq!(alarm.value, "Yes");
        assert_eq!(alarm.sources, vec![RA_SOURCE_TAG.to_string()]);
        assert!((alarm.confidence - RA_OVERLAY_CONFIDENCE).abs() < f64::EPSILON);

        let variant_sections = normalized
            .verbatim_sections
            .iter()
            .filter(|s| s.heading.as_deref() == Some("Variant"))
            .count();
        assert_eq!(variant_sections, 1);
    }

    #[test]
    fn base_mpn_gets_no_overlay() {
        let products = vec![product("https://a.com", SourceType::Oem, 0.9, &[("V", "1")])];
        let normalized = normalize(&products, Some("M1-1120-3")).unwrap();
        assert!(!normalized.specs.contains_key("Remote Alarm"));
    }

    #[test]
    fn datasheet_injection_skipped_when_present() {
        let mut products = vec![{
            let mut p = product("datasheet:M1-1120-3", SourceType::Datasheet, 0.95, &[]);
            p.raw_datasheet = Some(json!({}));
            p
        }];
        inject_datasheet(&mut products, "M1-1120-3", "SurgePure", json!({"x": 1}));
        assert_eq!(products.len(), 1);
    }

    #[test]
    fn datasheet_blob_flattens_nested_groups() {
        let blob = json!({
            "electrical_specs": {
                "nominal_ac_line_voltage_vrms_raw": "120/240",
                "frequency_range": "50/60 Hz"
            },
            "mechanical_specs": { "enclosure_size": "10x8x4 in" },
            "safety_and_compliance": { "agency_approvals": "UL 1449" },
            "overview": { "text": "Protects downline equipment." },
            "key_features": { "raw_bullets": ["Thermal MOV protection", "LED status"] }
        });

        let mut products = Vec::new();
        inject_datasheet(&mut products, "M1-1120-3", "SurgePure", blob);
        let normalized = normalize(&products, None).unwrap();

        assert_eq!(
            normalized.specs.get("Nominal AC Line Voltage (VRMS)").unwrap().value,
            "120/240"
        );
        assert_eq!(
            normalized.specs.get("Enclosure Size (HxWxD)").unwrap().value,
            "10x8x4 in"
        );
        assert_eq!(normalized.specs.get("Agency Approvals").unwrap().value, "UL 1449");

        let headings: Vec<_> = normalized
            .verbatim_sections
            .iter()
            .filter_map(|s| s.heading.as_deref())
            .collect();
        assert!(headings.contains(&"Overview"));
        assert_eq!(
            headings.iter().filter(|h| **h == "Key Feature").count(),
            2
        );
    }

    #[test]
    fn legacy_flat_datasheet_shape_tolerated() {
        let blob = json!({
            "electrical_specs": { "voltage": "120 V" },
            "overview": "Flat overview text.",
            "key_features": ["One", "Two"]
        });
        let mut products = Vec::new();
        inject_datasheet(&mut products, "M1-1120-3", "SurgePure", blob);
        let normalized = normalize(&products, None).unwrap();
        assert!(normalized
            .verbatim_sections
            .iter()
            .any(|s| s.text == "Flat overview text."));
        assert_eq!(
            normalized
                .verbatim_sections
                .iter()
                .filter(|s| s.heading.as_deref() == Some("Key Feature"))
                .count(),
            2
        );
    }

    #[test]
    fn oem_title_preferred() {
        let mut oem = product("https://surgepure.com/m1", SourceType::Oem, 0.8, &[]);
        oem.canonical_title = Some("M1-1120-3 Surge Protective Device".into());
        let mut dist = product("https://dist.com/m1", SourceType::Distributor, 0.9, &[]);
        dist.canonical_title = Some("SurgePure M1-1120-3 SPD".into());

        let normalized = normalize(&[dist, oem], None).unwrap();
        assert_eq!(normalized.canonical_title, "M1-1120-3 Surge Protective Device");
    }

    #[test]
    fn overall_confidence_is_mean() {
        let products = [
            product("https://a.com", SourceType::Unknown, 0.6, &[]),
            product("https://b.com", SourceType::Unknown, 0.8, &[]),
        ];
        let normalized = normalize(&products, None).unwrap();
        assert!((normalized.overall_confidence - 0.7).abs() < 1e-12);
    }
}
