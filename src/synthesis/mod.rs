//! Grounded catalog-content synthesis.
//!
//! Hands the LLM a fact-only payload (spec values, media links, verbatim
//! descriptor text, never confidences or sources) under a prompt that
//! forbids inventing facts, then validates and repairs the response
//! deterministically. Everything the model may not have produced well
//! (empty overview, ungrounded features, over-long SEO text) is fixed or
//! filtered here rather than re-prompted.

use std::collections::BTreeMap;

use serde_json::json;
use tracing::{debug, info};

use crate::error::Result;
use crate::llm::LlmClient;
use crate::model::{NormalizedProduct, SynthesisOutput};
use crate::util::safe_truncate_chars;

/// Hard cap on the SEO description.
pub const SEO_DESCRIPTION_MAX_CHARS: usize = 160;

/// Ceiling of the content-confidence formula.
pub const CONTENT_CONFIDENCE_CAP: f64 = 0.85;

const INSTALLATION_DISCLAIMER: &str =
    "Installation should follow local electrical codes and be performed by qualified personnel.";
const GAPS_DISCLAIMER: &str =
    "Some specifications were not provided and are listed as Not specified.";

/// The fact-only payload given to the LLM. No confidences, no provenance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FactPayload {
    pub mpn: String,
    pub manufacturer: String,
    pub canonical_title: String,
    pub specs: BTreeMap<String, String>,
    pub images: Vec<String>,
    pub datasheets: Vec<DatasheetRef>,
    pub descriptors: Vec<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasheetRef {
    pub url: String,
    pub label: String,
}

fn datasheet_label(url: &str) -> String {
    url.rsplit('/')
        .next()
        .unwrap_or(url)
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_string()
}

/// Strip a normalized product down to facts.
#[must_use]
pub fn fact_payload(product: &NormalizedProduct) -> FactPayload {
    FactPayload {
        mpn: product.mpn.clone(),
        manufacturer: product.manufacturer.clone(),
        canonical_title: product.canonical_title.clone(),
        specs: product
            .specs
            .iter()
            .map(|(key, merged)| (key.clone(), merged.value.clone()))
            .collect(),
        images: product.images.clone(),
        datasheets: product
            .datasheets
            .iter()
            .map(|url| DatasheetRef {
                url: url.clone(),
                label: datasheet_label(url),
            })
            .collect(),
        descriptors: product
            .verbatim_sections
            .iter()
            .map(|section| match &section.heading {
                Some(heading) => format!("{heading}: {}", section.text),
                None => section.text.clone(),
            })
            .collect(),
    }
}

fn synthesis_prompt(payload: &FactPayload) -> String {
    let facts = serde_json::to_string_pretty(&json!({
        "mpn": payload.mpn,
        "manufacturer": payload.manufacturer,
        "canonical_title": payload.canonical_title,
        "specs": payload.specs,
        "descriptors": payload.descriptors,
        "image_count": payload.images.len(),
        "datasheet_count": payload.datasheets.len(),
    }))
    .unwrap_or_default();

    format!(
        "You are writing catalog content for an industrial electrical part.\n\
         Use ONLY the facts below. Do not invent specifications, numeric values,\n\
         certifications, or category terms that are absent from the input. Every\n\
         keyFeatures entry must be \"Label: Value\" where Label is exactly one of\n\
         the spec keys. Multi-paragraph overview prose is welcome when the\n\
         descriptors are rich; otherwise stay brief and factual.\n\n\
         FACTS:\n{facts}\n\n\
         Return ONLY a JSON object with keys: canonicalTitle, displayTitle,\n\
         keyFeatures (array of \"Label: Value\" strings), overview,\n\
         shortDescription, longDescription, bulletHighlights (array),\n\
         seoDescription (max 160 characters), disclaimers (array).\n"
    )
}

fn parse_output(value: &serde_json::Value) -> SynthesisOutput {
    let get_str = |key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string()
    };
    let get_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    };

    SynthesisOutput {
        canonical_title: get_str("canonicalTitle"),
        display_title: get_str("displayTitle"),
        key_features: get_list("keyFeatures"),
        overview: get_str("overview"),
        short_description: get_str("shortDescription"),
        long_description: get_str("longDescription"),
        bullet_highlights: get_list("bulletHighlights"),
        seo_description: get_str("seoDescription"),
        disclaimers: get_list("disclaimers"),
        confidence: 0.0,
    }
}

/// Deterministic repairs applied to whatever the model returned.
pub fn post_validate(mut output: SynthesisOutput, payload: &FactPayload) -> SynthesisOutput {
    // Titles that leak a site name are replaced wholesale.
    let title_lower = output.canonical_title.to_lowercase();
    if title_lower.contains(".com") || title_lower.contains(".net") {
        output.canonical_title = format!("{} {}", payload.manufacturer, payload.mpn)
            .trim()
            .to_string();
    }
    if output.canonical_title.is_empty() {
        output.canonical_title = payload.canonical_title.clone();
    }
    if output.display_title.is_empty() {
        output.display_title = output.canonical_title.clone();
    }

    // Grounding invariant: a key feature whose label is not an input spec
    // key did not come from the facts. Drop it.
    output.key_features.retain(|feature| {
        let label = feature.split(':').next().unwrap_or("").trim();
        payload.specs.contains_key(label)
    });

    if output.overview.is_empty() && output.key_features.len() >= 4 {
        output.overview = format!(
            "The {} {} is characterized by {}.",
            payload.manufacturer,
            payload.mpn,
            output
                .key_features
                .iter()
                .take(4)
                .map(|f| f.to_lowercase())
                .collect::<Vec<_>>()
                .join("; ")
        );
    }
    if output.short_description.is_empty() {
        if let Some(first) = output.key_features.first() {
            output.short_description =
                format!("{} {}: {}.", payload.manufacturer, payload.mpn, first);
        }
    }

    output.seo_description =
        safe_truncate_chars(&output.seo_description, SEO_DESCRIPTION_MAX_CHARS).to_string();

    let has_gaps = payload.specs.is_empty()
        || payload
            .specs
            .values()
            .any(|v| v.eq_ignore_ascii_case("not specified"));
    if has_gaps && !output.disclaimers.iter().any(|d| d == GAPS_DISCLAIMER) {
        output.disclaimers.push(GAPS_DISCLAIMER.to_string());
    }
    if !output
        .disclaimers
        .iter()
        .any(|d| d == INSTALLATION_DISCLAIMER)
    {
        output.disclaimers.push(INSTALLATION_DISCLAIMER.to_string());
    }

    output.confidence = content_confidence(&output, payload);
    output
}

/// `min(0.85, grounded_features/total_specs + 0.1·images + 0.1·datasheets)`.
#[must_use]
pub fn content_confidence(output: &SynthesisOutput, payload: &FactPayload) -> f64 {
    let grounded = output
        .key_features
        .iter()
        .filter(|feature| {
            let label = feature.split(':').next().unwrap_or("").trim();
            payload.specs.contains_key(label)
        })
        .count();

    let ratio = if payload.specs.is_empty() {
        0.0
    } else {
        grounded as f64 / payload.specs.len() as f64
    };

    let mut score = ratio;
    if !payload.images.is_empty() {
        score += 0.1;
    }
    if !payload.datasheets.is_empty() {
        score += 0.1;
    }
    score.min(CONTENT_CONFIDENCE_CAP)
}

/// Generate catalog content for a normalized product.
///
/// Errors only when the LLM response cannot be coerced into JSON; every
/// other weakness is repaired by [`post_validate`].
pub async fn synthesize(llm: &LlmClient, product: &NormalizedProduct) -> Result<SynthesisOutput> {
    let payload = fact_payload(product);
    debug!(
        mpn = %payload.mpn,
        specs = payload.specs.len(),
        descriptors = payload.descriptors.len(),
        "requesting synthesis"
    );

    let response = llm.generate_structured(&synthesis_prompt(&payload)).await?;
    let output = post_validate(parse_output(&response), &payload);

    info!(
        mpn = %payload.mpn,
        features = output.key_features.len(),
        confidence = output.confidence,
        "synthesis complete"
    );
    Ok(output)
}
