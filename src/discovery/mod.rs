//! Product-page discovery over a web-search backend.
//!
//! Issues a quoted `"<mpn>" "<manufacturer>"` query, ranks the organic
//! results with the linear model in [`ranker`], and emits a primary URL,
//! backups, any PDF hits, and a relative confidence. Falls back to a
//! `"<mpn>" datasheet pdf` query when ranking produces nothing usable.
//!
//! Discovery is best-effort by design: it only errors on search-backend
//! HTTP failure, never on ranking ambiguity.

pub mod ranker;

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::confidence::StageConfidence;
use crate::config::EnrichConfig;
use crate::error::{EnrichError, Result};

pub use ranker::{FeatureVector, SearchCandidate};

/// Maximum organic results requested per query.
pub const MAX_RESULTS: usize = 10;
/// Maximum backup URLs carried on the outcome.
pub const MAX_BACKUP_URLS: usize = 3;
/// Maximum PDF URLs carried on the outcome.
pub const MAX_PDF_URLS: usize = 3;

const SEARCH_RETRIES: u32 = 2;

/// One organic result from the search proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(alias = "url")]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
}

/// The search proxy responds with either an `organic` or a `results` array.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl SearchResponse {
    fn into_hits(self) -> Vec<SearchHit> {
        if self.organic.is_empty() {
            self.results
        } else {
            self.organic
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: usize,
}

/// What discovery hands the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryOutcome {
    pub primary_product_url: Option<String>,
    pub backup_urls: Vec<String>,
    pub pdf_urls: Vec<String>,
    pub confidence: StageConfidence,
}

impl DiscoveryOutcome {
    fn empty() -> Self {
        Self {
            primary_product_url: None,
            backup_urls: Vec::new(),
            pdf_urls: Vec::new(),
            confidence: StageConfidence::Low,
        }
    }
}

/// Client for the Google-search proxy.
pub struct SearchClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl SearchClient {
    #[must_use]
    pub fn new(config: &EnrichConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: config.search_endpoint_url().to_string(),
            api_key: config.search_api_key_value().to_string(),
        }
    }

    /// Run one query, retrying transient backend failures with jittered
    /// exponential backoff.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let mut retries = 0;
        loop {
            match self.search_once(query).await {
                Ok(hits) => return Ok(hits),
                Err(e) if retries < SEARCH_RETRIES && e.is_transient() => {
                    let delay = 2u64.pow(retries) * 500 + rand::rng().random_range(0..500);
                    warn!(
                        query,
                        retry = retries + 1,
                        delay_ms = delay,
                        error = %e,
                        "search backend error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    retries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn search_once(&self, query: &str) -> Result<Vec<SearchHit>> {
        let body = SearchRequest {
            q: query,
            num: MAX_RESULTS,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichError::SearchBackend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::SearchBackend(format!(
                "{status} from {}",
                self.endpoint
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::SearchBackend(format!("malformed response: {e}")))?;
        Ok(parsed.into_hits())
    }
}

fn is_pdf_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or(&lower);
    path.ends_with(".pdf")
}

/// Partition ranked candidates into the outcome shape.
fn assemble(candidates: &[SearchCandidate], confidence: StageConfidence) -> DiscoveryOutcome {
    let mut pages = Vec::new();
    let mut pdfs = Vec::new();
    for candidate in candidates {
        if is_pdf_url(&candidate.url) {
            if pdfs.len() < MAX_PDF_URLS {
                pdfs.push(candidate.url.clone());
            }
        } else if pages.len() < 1 + MAX_BACKUP_URLS {
            pages.push(candidate.url.clone());
        }
    }

    let mut pages = pages.into_iter();
    DiscoveryOutcome {
        primary_product_url: pages.next(),
        backup_urls: pages.collect(),
        pdf_urls: pdfs,
        confidence,
    }
}

/// Discover candidate URLs for an MPN.
///
/// Errors only on search-backend HTTP failure; an empty or ambiguous result
/// set degrades to the datasheet-pdf fallback query and, failing that, an
/// empty low-confidence outcome.
pub async fn discover(
    client: &SearchClient,
    mpn: &str,
    manufacturer: &str,
) -> Result<DiscoveryOutcome> {
    let query = format!("\"{mpn}\" \"{manufacturer}\"");
    let hits = client.search(&query).await?;
    debug!(mpn, results = hits.len(), "primary discovery query returned");

    let ranked = ranker::rank(&hits, mpn, manufacturer);
    let usable = ranked
        .first()
        .is_some_and(|top| top.score >= ranker::MIN_USABLE_SCORE);

    if usable {
        let confidence = ranker::separation_confidence(&ranked);
        let outcome = assemble(&ranked, confidence);
        info!(
            mpn,
            primary = outcome.primary_product_url.as_deref().unwrap_or("-"),
            confidence = %outcome.confidence,
            "discovery ranked a primary URL"
        );
        return Ok(outcome);
    }

    // Fallback: hunt for a datasheet PDF directly.
    let fallback_query = format!("\"{mpn}\" datasheet pdf");
    let fallback_hits = client.search(&fallback_query).await?;
    let pdf_urls: Vec<String> = fallback_hits
        .iter()
        .filter(|h| is_pdf_url(&h.link))
        .take(MAX_PDF_URLS)
        .map(|h| h.link.clone())
        .collect();

    let confidence = if pdf_urls.is_empty() {
        StageConfidence::Low
    } else {
        StageConfidence::Medium
    };
    info!(mpn, pdfs = pdf_urls.len(), confidence = %confidence, "discovery fell back to datasheet query");

    Ok(DiscoveryOutcome {
        pdf_urls,
        confidence,
        ..DiscoveryOutcome::empty()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_tolerates_both_shapes() {
        let organic: SearchResponse = serde_json::from_str(
            r#"{"organic":[{"link":"https://a.com","title":"A","snippet":"s"}]}"#,
        )
        .unwrap();
        assert_eq!(organic.into_hits().len(), 1);

        let results: SearchResponse = serde_json::from_str(
            r#"{"results":[{"link":"https://a.com","title":"A","snippet":"s"},{"link":"https://b.com","title":"B","snippet":"s"}]}"#,
        )
        .unwrap();
        assert_eq!(results.into_hits().len(), 2);
    }

    #[test]
    fn pdf_urls_are_partitioned() {
        let candidates = vec![
            SearchCandidate {
                url: "https://surgepure.com/products/m1".into(),
                title: String::new(),
                snippet: String::new(),
                features: ranker::featurize(
                    &SearchHit {
                        link: "https://surgepure.com/products/m1".into(),
                        title: String::new(),
                        snippet: String::new(),
                    },
                    "M1",
                    "SurgePure",
                ),
                score: 0.9,
            },
            SearchCandidate {
                url: "https://surgepure.com/docs/m1.pdf".into(),
                title: String::new(),
                snippet: String::new(),
                features: ranker::featurize(
                    &SearchHit {
                        link: "https://surgepure.com/docs/m1.pdf".into(),
                        title: String::new(),
                        snippet: String::new(),
                    },
                    "M1",
                    "SurgePure",
                ),
                score: 0.7,
            },
        ];
        let outcome = assemble(&candidates, StageConfidence::High);
        assert_eq!(
            outcome.primary_product_url.as_deref(),
            Some("https://surgepure.com/products/m1")
        );
        assert!(outcome.backup_urls.is_empty());
        assert_eq!(outcome.pdf_urls, vec!["https://surgepure.com/docs/m1.pdf"]);
    }

    #[test]
    fn pdf_detection_ignores_query_strings() {
        assert!(is_pdf_url("https://a.com/ds/m1.PDF?download=1"));
        assert!(!is_pdf_url("https://a.com/ds/m1.pdf.html"));
    }

    #[test]
    fn backup_urls_are_capped() {
        let hits: Vec<SearchHit> = (0..8)
            .map(|i| SearchHit {
                link: format!("https://site{i}.com/products/m1-1120-3"),
                title: "M1-1120-3".into(),
                snippet: "SurgePure".into(),
            })
            .collect();
        let ranked = ranker::rank(&hits, "M1-1120-3", "SurgePure");
        let outcome = assemble(&ranked, StageConfidence::Low);
        assert!(outcome.primary_product_url.is_some());
        assert_eq!(outcome.backup_urls.len(), MAX_BACKUP_URLS);
    }
}
