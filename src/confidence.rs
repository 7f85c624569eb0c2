//! Confidence arithmetic shared by the pipeline stages.
//!
//! Every stage reports how much it trusts its own output; the final blend
//! turns those per-stage signals into the single score that decides whether
//! a result is usable. The weights live here so the whole scheme can be
//! read in one place.

use serde::{Deserialize, Serialize};

/// Coarse per-stage confidence reported by discovery and the crawler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageConfidence {
    High,
    Medium,
    Low,
}

impl StageConfidence {
    /// Numeric value used by the final blend.
    #[must_use]
    pub fn as_score(self) -> f64 {
        match self {
            Self::High => 0.9,
            Self::Medium => 0.6,
            Self::Low => 0.3,
        }
    }
}

impl std::fmt::Display for StageConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Per-stage scores carried on the final result so a consumer can explain
/// a low blended confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    pub discovery: f64,
    pub crawl: f64,
    pub extraction: f64,
    pub synthesis: f64,
}

/// A result is usable when the blended confidence reaches this floor.
pub const USABLE_THRESHOLD: f64 = 0.65;

/// Crawl score when tier 1 satisfied the product-page heuristics.
pub const CRAWL_SCORE_DIRECT: f64 = 0.85;
/// Crawl score when the headless browser had to render the page.
pub const CRAWL_SCORE_BROWSER: f64 = 0.6;

const WEIGHT_DISCOVERY: f64 = 0.25;
const WEIGHT_CRAWL: f64 = 0.20;
const WEIGHT_EXTRACTION: f64 = 0.30;
const WEIGHT_SYNTHESIS: f64 = 0.25;

/// Blend the stage scores into the final confidence.
#[must_use]
pub fn blend(breakdown: &ConfidenceBreakdown) -> f64 {
    WEIGHT_DISCOVERY * breakdown.discovery
        + WEIGHT_CRAWL * breakdown.crawl
        + WEIGHT_EXTRACTION * breakdown.extraction
        + WEIGHT_SYNTHESIS * breakdown.synthesis
}

/// Usability rule: `usable ⇔ confidence ≥ USABLE_THRESHOLD`.
#[must_use]
pub fn is_usable(confidence: f64) -> bool {
    confidence >= USABLE_THRESHOLD
}
