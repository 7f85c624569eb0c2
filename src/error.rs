//! Error types for the enrichment pipeline.
//!
//! Stage boundaries communicate with discriminated results (`CrawlOutcome`,
//! `ExtractOutcome`, `FinalResult`), so `EnrichError` is reserved for the
//! failures that genuinely abort an MPN: backend HTTP errors, unparseable
//! LLM output, and datasheet parses that did not recover enough rows.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EnrichError>;

#[derive(Debug, Error)]
pub enum EnrichError {
    /// Search backend returned a non-success status or was unreachable.
    #[error("search backend request failed: {0}")]
    SearchBackend(String),

    /// LLM endpoint returned a non-success status or was unreachable.
    #[error("llm request failed: {0}")]
    LlmHttp(String),

    /// LLM response text did not contain a parseable JSON object.
    #[error("llm response was not valid JSON: {0}")]
    LlmParse(String),

    /// Datasheet PDF could not be downloaded.
    #[error("datasheet download failed for {url}: {message}")]
    PdfDownload { url: String, message: String },

    /// Datasheet text parsed but too few spec rows survived.
    #[error("datasheet parse recovered only {rows} spec rows (need {minimum})")]
    PdfRowUnderflow { rows: usize, minimum: usize },

    /// PDF bytes could not be converted to text.
    #[error("pdf text extraction failed: {0}")]
    PdfText(String),

    /// Normalizer was handed an empty evidence list.
    #[error("normalizer requires at least one extracted product")]
    NoEvidence,

    /// IO error (cache reads/writes, spreadsheet adapters).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for EnrichError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} preserves the context chain
        Self::Other(format!("{err:#}"))
    }
}

impl EnrichError {
    /// Whether retrying the same MPN later could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SearchBackend(_) | Self::LlmHttp(_) | Self::PdfDownload { .. } | Self::Io(_)
        )
    }
}

/// Why a pipeline run produced a non-usable `FinalResult`.
///
/// These are outcomes, not errors: the pipeline returns a tagged result and
/// the batch caller moves on to the next row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// Discovery emitted nothing usable.
    NoProductUrls,
    /// Every candidate URL failed both crawl tiers.
    CrawlFailed,
    /// HTML parsed but extraction quality fell below the floor.
    LowExtractionQuality,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoProductUrls => write!(f, "NO_PRODUCT_URLS"),
            Self::CrawlFailed => write!(f, "CRAWL_FAILED"),
            Self::LowExtractionQuality => write!(f, "LOW_EXTRACTION_QUALITY"),
        }
    }
}
