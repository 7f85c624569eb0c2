//! partscribe: catalog-content enrichment for industrial electrical parts.
//!
//! Given `(MPN, manufacturer)` pairs, the pipeline discovers a product
//! page, crawls it (escalating to a headless browser when a cheap fetch
//! comes back blocked or empty), extracts grounded evidence, merges it
//! with any cached datasheet data, and synthesizes catalog content with a
//! calibrated confidence score.

pub mod confidence;
pub mod config;
pub mod crawler;
pub mod discovery;
pub mod error;
pub mod export;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod pdf;
pub mod pipeline;
pub mod store;
pub mod synthesis;
pub mod util;

pub use confidence::{ConfidenceBreakdown, StageConfidence, USABLE_THRESHOLD};
pub use config::EnrichConfig;
pub use crawler::{CrawlOutcome, Crawler, FallbackReason};
pub use discovery::DiscoveryOutcome;
pub use error::{EnrichError, FailureReason, Result};
pub use extract::{ExtractFailure, ExtractOutcome};
pub use model::{ExtractedProduct, FinalResult, NormalizedProduct, SynthesisOutput};
pub use pipeline::EnrichPipeline;

/// Enrich a single part with a one-shot pipeline.
///
/// Convenience wrapper for embedding callers; batch work should build one
/// [`EnrichPipeline`] and reuse it so the browser and HTTP clients amortize.
pub async fn enrich(config: &EnrichConfig, mpn: &str, manufacturer: &str) -> Result<FinalResult> {
    let pipeline = EnrichPipeline::new(config);
    let result = pipeline.enrich(mpn, manufacturer).await;
    pipeline.shutdown().await;
    result
}
