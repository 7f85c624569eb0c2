//! Core data model for the enrichment pipeline.
//!
//! Evidence flows as `ExtractedProduct` records (one per source), gets
//! merged into a `NormalizedProduct`, and ends as a `FinalResult` owned by
//! the pipeline driver. Spec keys are domain-authored strings; `BTreeMap`
//! keeps merge and serialization order deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::confidence::ConfidenceBreakdown;
use crate::error::FailureReason;

/// Where a piece of evidence came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// The manufacturer's own product page.
    Oem,
    /// A reseller's product page.
    Distributor,
    /// A PDF fetched from the web.
    Pdf,
    /// A locally cached, pre-parsed datasheet.
    Datasheet,
    Unknown,
}

/// A verbatim block of descriptive text carried through to synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbatimSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl VerbatimSection {
    #[must_use]
    pub fn new(heading: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            heading: heading.map(ToString::to_string),
            text: text.into(),
            source: None,
        }
    }
}

/// Evidence extracted from one source.
///
/// Invariant: every spec value is a non-empty trimmed string, and was
/// actually observed at the source; extractors never invent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedProduct {
    pub mpn: String,
    pub manufacturer: String,
    pub source_url: String,
    pub source_type: SourceType,
    /// Per-source confidence in [0, 1].
    pub confidence: f64,
    pub canonical_title: Option<String>,
    pub display_title: Option<String>,
    pub specs: BTreeMap<String, String>,
    pub verbatim_sections: Vec<VerbatimSection>,
    pub images: Vec<String>,
    pub datasheets: Vec<String>,
    /// Raw datasheet JSON blob, present only for `SourceType::Datasheet`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_datasheet: Option<serde_json::Value>,
}

impl ExtractedProduct {
    #[must_use]
    pub fn new(mpn: &str, manufacturer: &str, source_url: &str, source_type: SourceType) -> Self {
        Self {
            mpn: mpn.to_string(),
            manufacturer: manufacturer.to_string(),
            source_url: source_url.to_string(),
            source_type,
            confidence: 0.0,
            canonical_title: None,
            display_title: None,
            specs: BTreeMap::new(),
            verbatim_sections: Vec::new(),
            images: Vec::new(),
            datasheets: Vec::new(),
            raw_datasheet: None,
        }
    }

    /// Insert a spec value if it survives trimming. Empty values are
    /// silently dropped, preserving the non-empty invariant.
    pub fn push_spec(&mut self, key: &str, value: &str) {
        let key = key.trim().trim_end_matches(':').trim();
        let value = value.trim();
        if !key.is_empty() && !value.is_empty() {
            self.specs.insert(key.to_string(), value.to_string());
        }
    }
}

/// One merged spec entry with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedSpec {
    pub value: String,
    /// Every source URL (or tag) that contributed this key.
    pub sources: Vec<String>,
    /// Confidence of the source whose value was retained.
    pub confidence: f64,
}

/// The merged, canonical view over all evidence for one MPN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedProduct {
    pub mpn: String,
    pub manufacturer: String,
    pub canonical_title: String,
    pub specs: BTreeMap<String, MergedSpec>,
    pub verbatim_sections: Vec<VerbatimSection>,
    pub images: Vec<String>,
    pub datasheets: Vec<String>,
    pub source_urls: Vec<String>,
    /// Arithmetic mean of per-source confidences.
    pub overall_confidence: f64,
}

/// Catalog content generated by the synthesis stage.
///
/// Invariant: every `key_features` label appears as-is among the input spec
/// keys; no numeric value appears that is absent from the input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisOutput {
    #[serde(default)]
    pub canonical_title: String,
    #[serde(default)]
    pub display_title: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub long_description: String,
    #[serde(default)]
    pub bullet_highlights: Vec<String>,
    /// Hard-capped at 160 characters.
    #[serde(default)]
    pub seo_description: String,
    #[serde(default)]
    pub disclaimers: Vec<String>,
    /// Grounding-based confidence in [0, 1].
    #[serde(default, rename = "_confidence")]
    pub confidence: f64,
}

/// One row of the final spec table (key features split on the first colon).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRow {
    pub key: String,
    pub value: String,
}

/// The pipeline's return value for one MPN.
///
/// Invariant: `usable ⇔ confidence ≥ 0.65`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub mpn: String,
    pub manufacturer: String,
    pub canonical_title: String,
    pub display_title: String,
    pub key_features: Vec<String>,
    pub overview: String,
    pub short_description: String,
    pub long_description: String,
    pub bullet_highlights: Vec<String>,
    pub seo_description: String,
    pub disclaimers: Vec<String>,
    pub spec_table: Vec<SpecRow>,
    pub product_type: Option<String>,
    pub images: Vec<String>,
    pub datasheets: Vec<String>,
    pub source_url: Option<String>,
    pub confidence_breakdown: ConfidenceBreakdown,
    pub confidence: f64,
    pub usable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

/// Split a `"Label: Value"` feature into a spec-table row. Features without
/// a colon become a row with an empty value.
#[must_use]
pub fn split_feature(feature: &str) -> SpecRow {
    match feature.split_once(':') {
        Some((key, value)) => SpecRow {
            key: key.trim().to_string(),
            value: value.trim().to_string(),
        },
        None => SpecRow {
            key: feature.trim().to_string(),
            value: String::new(),
        },
    }
}

/// The variant suffix denoting a Remote-Alarm model.
pub const RA_SUFFIX: &str = "RA";

/// Split an MPN into its base part and whether it carries the RA variant
/// suffix. `M1-1120-3RA` → (`M1-1120-3`, true).
#[must_use]
pub fn split_ra_variant(mpn: &str) -> (&str, bool) {
    let trimmed = mpn.trim();
    match trimmed.strip_suffix(RA_SUFFIX) {
        // A bare "RA" is not a variant of an empty MPN.
        Some(base) if !base.is_empty() => (base, true),
        _ => (trimmed, false),
    }
}
