//! The enrichment pipeline driver.
//!
//! One invocation runs DISCOVER → CRAWL → EXTRACT → NORMALIZE → SYNTHESIZE
//! for a single MPN, accumulating the `FinalResult` and the confidence
//! breakdown along the way. Stage weaknesses degrade the result; only
//! backend HTTP failures and unrecoverable PDF/LLM parses surface as
//! errors.

use tracing::{info, warn};

use crate::confidence::{
    self, blend, ConfidenceBreakdown, CRAWL_SCORE_BROWSER, CRAWL_SCORE_DIRECT,
};
use crate::config::EnrichConfig;
use crate::crawler::Crawler;
use crate::discovery::{self, SearchClient};
use crate::error::{FailureReason, Result};
use crate::extract::{self, ExtractInput, ExtractOutcome};
use crate::llm::LlmClient;
use crate::model::{
    split_feature, split_ra_variant, ExtractedProduct, FinalResult, NormalizedProduct, SpecRow,
    SynthesisOutput,
};
use crate::normalize;
use crate::pdf;
use crate::store::Store;
use crate::synthesis;

const RA_SENTENCE: &str =
    "This model includes a remote alarm output for system monitoring.";

/// The assembled pipeline with its long-lived clients.
pub struct EnrichPipeline {
    search: SearchClient,
    crawler: Crawler,
    llm: LlmClient,
    store: Store,
    pdf_client: reqwest::Client,
}

impl EnrichPipeline {
    #[must_use]
    pub fn new(config: &EnrichConfig) -> Self {
        Self {
            search: SearchClient::new(config),
            crawler: Crawler::new(config),
            llm: LlmClient::new(config),
            store: Store::new(config),
            pdf_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Release shared resources (the headless browser).
    pub async fn shutdown(&self) {
        self.crawler.browser_manager().shutdown().await;
    }

    /// Enrich one MPN end-to-end.
    pub async fn enrich(&self, mpn: &str, manufacturer: &str) -> Result<FinalResult> {
        let (base_mpn, is_ra) = split_ra_variant(mpn);
        info!(mpn, base_mpn, is_ra, manufacturer, "starting enrichment");

        // DISCOVER: search errors propagate, empty results degrade.
        let discovery = discovery::discover(&self.search, base_mpn, manufacturer).await?;
        let discovery_score = discovery.confidence.as_score();

        let mut candidate_urls = Vec::new();
        if let Some(primary) = &discovery.primary_product_url {
            candidate_urls.push(primary.clone());
        }
        candidate_urls.extend(discovery.backup_urls.iter().cloned());

        if candidate_urls.is_empty() && discovery.pdf_urls.is_empty() {
            warn!(mpn, "discovery produced nothing usable");
            return Ok(non_usable(
                mpn,
                manufacturer,
                FailureReason::NoProductUrls,
                ConfidenceBreakdown {
                    discovery: discovery_score,
                    crawl: 0.0,
                    extraction: 0.0,
                    synthesis: 0.0,
                },
            ));
        }

        // CRAWL + EXTRACT, or the datasheet-PDF leaf when the web gave us
        // nothing but PDFs.
        let mut crawl_score = 0.0;
        let mut extraction_score = 0.0;
        let mut evidence: Vec<ExtractedProduct> = Vec::new();
        let mut source_url: Option<String> = None;

        let crawl = if candidate_urls.is_empty() {
            None
        } else {
            self.crawler.crawl_first_usable(&candidate_urls).await
        };

        match crawl {
            Some(outcome) if outcome.html.is_some() => {
                crawl_score = if outcome.used_browser {
                    CRAWL_SCORE_BROWSER
                } else {
                    CRAWL_SCORE_DIRECT
                };
                let html = outcome.html.as_deref().unwrap_or_default();
                let extracted = extract::extract(ExtractInput {
                    html,
                    source_url: &outcome.final_url,
                    mpn: base_mpn,
                    manufacturer: Some(manufacturer),
                });
                extraction_score = extracted.quality();
                source_url = Some(outcome.final_url.clone());

                match extracted {
                    ExtractOutcome::Ok { product, .. } => evidence.push(product),
                    ExtractOutcome::Failed { reason, .. } => {
                        warn!(mpn, ?reason, "extraction refused");
                        return Ok(non_usable(
                            mpn,
                            manufacturer,
                            FailureReason::LowExtractionQuality,
                            ConfidenceBreakdown {
                                discovery: discovery_score,
                                crawl: crawl_score,
                                extraction: extraction_score,
                                synthesis: 0.0,
                            },
                        ));
                    }
                }
            }
            _ if !discovery.pdf_urls.is_empty() => {
                // PDF-only discovery: parse the first datasheet directly.
                // PDF and LLM failures propagate to the caller here.
                let pdf_url = &discovery.pdf_urls[0];
                let (parse, bytes) = pdf::fetch_and_parse(&self.pdf_client, pdf_url).await?;
                if let Err(e) = self.store.save_pdf(base_mpn, &bytes).await {
                    warn!(mpn, error = %e, "failed to cache datasheet pdf");
                }
                let mapped = pdf::map_to_model(&self.llm, &parse, Some(base_mpn)).await?;
                let product =
                    pdf::to_extracted_product(&parse, &mapped, base_mpn, manufacturer, pdf_url);

                crawl_score = CRAWL_SCORE_BROWSER;
                extraction_score = product.confidence;
                source_url = Some(pdf_url.clone());
                evidence.push(product);
            }
            _ => {
                warn!(mpn, "all candidate URLs failed both crawl tiers");
                return Ok(non_usable(
                    mpn,
                    manufacturer,
                    FailureReason::CrawlFailed,
                    ConfidenceBreakdown {
                        discovery: discovery_score,
                        crawl: 0.0,
                        extraction: 0.0,
                        synthesis: 0.0,
                    },
                ));
            }
        }

        // NORMALIZE: inject the cached datasheet when one exists.
        if let Some(blob) = self.store.load_datasheet_json(base_mpn).await {
            normalize::inject_datasheet(&mut evidence, base_mpn, manufacturer, blob);
        }
        let normalized = normalize::normalize(&evidence, Some(mpn))?;

        // SYNTHESIZE: LLM parse failures propagate.
        let output = synthesis::synthesize(&self.llm, &normalized).await?;

        let breakdown = ConfidenceBreakdown {
            discovery: discovery_score,
            crawl: crawl_score,
            extraction: extraction_score,
            synthesis: output.confidence,
        };

        let mut result = assemble_result(mpn, manufacturer, &normalized, output, breakdown);
        // The crawled (or datasheet) URL beats the provenance list's head,
        // which may be a cache tag rather than a fetchable location.
        result.source_url = source_url.or(result.source_url);

        if is_ra {
            apply_ra_patch(&mut result, mpn);
        }

        if result.usable {
            self.cache_primary_image(base_mpn, &result).await;
        }

        info!(
            mpn,
            confidence = result.confidence,
            usable = result.usable,
            "enrichment finished"
        );
        Ok(result)
    }

    /// Cache the primary product image locally. Best-effort: failures are
    /// logged, never fatal.
    async fn cache_primary_image(&self, mpn: &str, result: &FinalResult) {
        let Some(image_url) = result.images.first() else {
            return;
        };
        let path_part = image_url.split(['?', '#']).next().unwrap_or(image_url);
        let ext = path_part
            .rsplit('.')
            .next()
            .map(str::to_lowercase)
            .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp" | "gif"))
            .unwrap_or_else(|| "jpg".to_string());

        let bytes = match self.pdf_client.get(image_url).send().await {
            Ok(response) if response.status().is_success() => match response.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(mpn, error = %e, "image body read failed");
                    return;
                }
            },
            Ok(response) => {
                warn!(mpn, status = %response.status(), "image fetch refused");
                return;
            }
            Err(e) => {
                warn!(mpn, error = %e, "image fetch failed");
                return;
            }
        };

        if let Err(e) = self.store.save_image(mpn, &ext, &bytes).await {
            warn!(mpn, error = %e, "image cache write failed");
        }
    }
}

/// Derive the product-type string from the merged specs, else the title.
fn derive_product_type(normalized: &NormalizedProduct, output: &SynthesisOutput) -> Option<String> {
    for key in ["Product Type", "SPD Type"] {
        if let Some(merged) = normalized.specs.get(key) {
            if !merged.value.eq_ignore_ascii_case("not specified") {
                return Some(merged.value.clone());
            }
        }
    }
    let title = output.canonical_title.to_lowercase();
    if title.contains("surge protect") {
        return Some("Surge Protection Device".to_string());
    }
    None
}

fn assemble_result(
    mpn: &str,
    manufacturer: &str,
    normalized: &NormalizedProduct,
    output: SynthesisOutput,
    breakdown: ConfidenceBreakdown,
) -> FinalResult {
    let final_confidence = blend(&breakdown);
    let spec_table: Vec<SpecRow> = output.key_features.iter().map(|f| split_feature(f)).collect();
    let product_type = derive_product_type(normalized, &output);

    FinalResult {
        mpn: mpn.to_string(),
        manufacturer: manufacturer.to_string(),
        canonical_title: output.canonical_title,
        display_title: output.display_title,
        key_features: output.key_features,
        overview: output.overview,
        short_description: output.short_description,
        long_description: output.long_description,
        bullet_highlights: output.bullet_highlights,
        seo_description: output.seo_description,
        disclaimers: output.disclaimers,
        spec_table,
        product_type,
        images: normalized.images.clone(),
        datasheets: normalized.datasheets.clone(),
        source_url: normalized.source_urls.first().cloned(),
        confidence_breakdown: breakdown,
        confidence: final_confidence,
        usable: confidence::is_usable(final_confidence),
        failure_reason: None,
    }
}

/// Build the degraded result for a failed stage.
fn non_usable(
    mpn: &str,
    manufacturer: &str,
    reason: FailureReason,
    breakdown: ConfidenceBreakdown,
) -> FinalResult {
    // A quality failure keeps the extractor's score as the only signal; the
    // earlier failures report zero confidence outright.
    let confidence = match reason {
        FailureReason::LowExtractionQuality => breakdown.extraction,
        _ => 0.0,
    };

    FinalResult {
        mpn: mpn.to_string(),
        manufacturer: manufacturer.to_string(),
        canonical_title: format!("{manufacturer} {mpn}").trim().to_string(),
        display_title: mpn.to_string(),
        key_features: Vec::new(),
        overview: String::new(),
        short_description: String::new(),
        long_description: String::new(),
        bullet_highlights: Vec::new(),
        seo_description: String::new(),
        disclaimers: Vec::new(),
        spec_table: Vec::new(),
        product_type: None,
        images: Vec::new(),
        datasheets: Vec::new(),
        source_url: None,
        confidence_breakdown: breakdown,
        confidence,
        usable: false,
        failure_reason: Some(reason),
    }
}

/// Patch a usable result for the Remote-Alarm variant.
fn apply_ra_patch(result: &mut FinalResult, full_mpn: &str) {
    if !result.usable {
        return;
    }

    result.display_title = full_mpn.to_string();

    const RA_FEATURE: &str = "Remote Alarm: Yes";
    if !result.key_features.iter().any(|f| f == RA_FEATURE) {
        result.key_features.push(RA_FEATURE.to_string());
    }
    let ra_row = split_feature(RA_FEATURE);
    if !result.spec_table.contains(&ra_row) {
        result.spec_table.push(ra_row);
    }

    for text in [
        &mut result.overview,
        &mut result.short_description,
        &mut result.long_description,
    ] {
        if !text.contains(RA_SENTENCE) {
            if !text.is_empty() && !text.ends_with(' ') {
                text.push(' ');
            }
            text.push_str(RA_SENTENCE);
        }
    }
}
