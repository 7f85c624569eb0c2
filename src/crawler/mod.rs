//! Two-tier page crawler.
//!
//! Tier 1 is a cheap HTTP fetch; when the body fails the product-page
//! heuristics on both attempts, tier 2 escalates to a headless browser.
//! `crawl` never errors; every failure mode degrades into a tagged
//! [`CrawlOutcome`].

pub mod browser;
pub mod fetch;
pub mod heuristics;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::confidence::StageConfidence;
use crate::config::{EnrichConfig, FETCH_ATTEMPTS};

pub use browser::BrowserManager;

/// Why the crawler fell back or gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    FetchFailed,
    InvalidHtml,
    NonProduct,
    CaptchaOrJs,
}

/// Output of one crawl attempt.
///
/// Invariant: `html == None ⇒ confidence == Low`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub final_url: String,
    pub html: Option<String>,
    pub used_browser: bool,
    pub content_type: Option<String>,
    pub confidence: StageConfidence,
    pub fallback_reason: Option<FallbackReason>,
}

impl CrawlOutcome {
    fn failed(url: &str, reason: FallbackReason) -> Self {
        Self {
            final_url: url.to_string(),
            html: None,
            used_browser: reason == FallbackReason::CaptchaOrJs,
            content_type: None,
            confidence: StageConfidence::Low,
            fallback_reason: Some(reason),
        }
    }
}

/// The crawler's long-lived pieces: the tier-1 client and the shared
/// browser manager.
pub struct Crawler {
    client: reqwest::Client,
    browser: BrowserManager,
    navigation_timeout_secs: u64,
}

impl Crawler {
    #[must_use]
    pub fn new(config: &EnrichConfig) -> Self {
        Self {
            client: fetch::build_client(config.fetch_timeout_secs),
            browser: BrowserManager::new(),
            navigation_timeout_secs: config.navigation_timeout_secs,
        }
    }

    #[must_use]
    pub fn browser_manager(&self) -> &BrowserManager {
        &self.browser
    }

    /// Crawl one URL through both tiers. Never errors.
    pub async fn crawl(&self, url: &str) -> CrawlOutcome {
        let mut tier1_reason = FallbackReason::FetchFailed;

        for attempt in 1..=FETCH_ATTEMPTS {
            match fetch::fetch_page(&self.client, url).await {
                Ok(page) => {
                    if !heuristics::looks_valid_html(&page.body) {
                        debug!(url, attempt, "tier-1 body failed validity check");
                        tier1_reason = FallbackReason::InvalidHtml;
                        continue;
                    }
                    if heuristics::looks_like_product_page(&page.body)
                        && heuristics::has_usable_signal(&page.body)
                    {
                        info!(url, attempt, "tier-1 fetch produced a product page");
                        return CrawlOutcome {
                            final_url: page.final_url,
                            html: Some(page.body),
                            used_browser: false,
                            content_type: page.content_type,
                            confidence: StageConfidence::High,
                            fallback_reason: None,
                        };
                    }
                    debug!(url, attempt, "tier-1 body failed product-page shape");
                    tier1_reason = FallbackReason::NonProduct;
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "tier-1 fetch failed");
                    tier1_reason = FallbackReason::FetchFailed;
                }
            }
        }

        self.escalate(url, tier1_reason).await
    }

    /// Tier 2: render the page in the headless browser.
    async fn escalate(&self, url: &str, tier1_reason: FallbackReason) -> CrawlOutcome {
        info!(url, ?tier1_reason, "escalating to headless browser");

        match browser::render_page(&self.browser, url, self.navigation_timeout_secs).await {
            Ok((html, final_url)) => {
                if heuristics::has_usable_signal(&html) {
                    info!(url, "browser render produced usable content");
                    CrawlOutcome {
                        final_url,
                        html: Some(html),
                        used_browser: true,
                        content_type: Some("text/html".to_string()),
                        confidence: StageConfidence::Medium,
                        fallback_reason: None,
                    }
                } else {
                    // Loaded, but still nothing product-shaped. Keep the HTML
                    // so extraction can salvage what it can.
                    CrawlOutcome {
                        final_url,
                        html: Some(html),
                        used_browser: true,
                        content_type: Some("text/html".to_string()),
                        confidence: StageConfidence::Low,
                        fallback_reason: Some(FallbackReason::NonProduct),
                    }
                }
            }
            Err(e) => {
                warn!(url, error = %e, "browser navigation failed");
                CrawlOutcome::failed(url, FallbackReason::CaptchaOrJs)
            }
        }
    }

    /// Try candidate URLs in order, stopping at the first crawl that
    /// produced HTML. Per-URL failures are swallowed; the caller only sees
    /// the last outcome when everything failed.
    pub async fn crawl_first_usable(&self, urls: &[String]) -> Option<CrawlOutcome> {
        let mut last = None;
        for url in urls.iter().take(3) {
            let outcome = self.crawl(url).await;
            if outcome.html.is_some() {
                return Some(outcome);
            }
            debug!(url, reason = ?outcome.fallback_reason, "candidate URL yielded no HTML");
            last = Some(outcome);
        }
        last
    }
}
