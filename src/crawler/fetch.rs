//! Tier-1 cheap fetch.
//!
//! A plain HTTP GET with a realistic user agent and a hard per-attempt
//! deadline. This is the fast path; the caller decides whether the body it
//! returns is worth keeping.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::CHROME_USER_AGENT;

/// Raw result of one GET, before any heuristic judgement.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub final_url: String,
    pub body: String,
    pub content_type: Option<String>,
}

/// Build the shared tier-1 client. Redirects are followed (reqwest default);
/// the per-request deadline covers connect, headers, and body.
#[must_use]
pub fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(CHROME_USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// One GET attempt. Errors cover network failures, timeouts, and non-2xx
/// statuses alike; the caller treats them all as "tier 1 did not deliver".
pub async fn fetch_page(client: &reqwest::Client, url: &str) -> Result<FetchedPage> {
    let response = client
        .get(url)
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .with_context(|| format!("GET {url} failed"))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("GET {url} returned {status}");
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let body = response
        .text()
        .await
        .with_context(|| format!("reading body of {url} failed"))?;

    debug!(url, final_url, bytes = body.len(), "tier-1 fetch complete");

    Ok(FetchedPage {
        final_url,
        body,
        content_type,
    })
}
