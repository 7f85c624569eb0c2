//! Content-shape heuristics for fetched HTML.
//!
//! These decide whether a cheap tier-1 fetch actually returned a product
//! page or something that needs browser rendering: a bot challenge, a JS
//! shell, a storefront homepage, or an unrelated page. All checks work on
//! the raw HTML string so they stay cheap enough to run on every fetch.

use std::sync::LazyLock;

use regex::Regex;

/// Minimum body length for a response to count as real HTML.
pub const MIN_VALID_HTML_LEN: usize = 1000;
/// Minimum body length for the usable-signal check.
pub const USABLE_SIGNAL_MIN_LEN: usize = 8000;
/// MPN-shaped tokens required for the token-density usable signal.
pub const MIN_MPN_LIKE_TOKENS: usize = 5;

static MPN_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,4}\d*-\d{2,5}(?:-[A-Z0-9]+)*\b").unwrap());

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

/// Basic validity: long enough to be a rendered page, and not an obvious
/// challenge interstitial.
#[must_use]
pub fn looks_valid_html(html: &str) -> bool {
    if html.len() < MIN_VALID_HTML_LEN {
        return false;
    }
    let lower = html.to_lowercase();
    !lower.contains("enable javascript") && !lower.contains("captcha")
}

/// Storefront homepage detector.
///
/// Homepages have navigation chrome plus either grid-marketing phrases or
/// repeated product cards; a single product page has neither in volume.
#[must_use]
pub fn looks_like_homepage(html: &str) -> bool {
    let lower = html.to_lowercase();

    let nav_count = count_occurrences(&lower, "<nav");
    if nav_count < 2 {
        return false;
    }

    let marketing = ["featured products", "categories", "shop by"];
    let has_marketing = marketing.iter().any(|p| lower.contains(p));
    let product_cards = count_occurrences(&lower, "product-card");

    has_marketing || product_cards >= 3
}

fn has_spec_markup(lower: &str) -> bool {
    lower.contains("specification")
        || lower.contains("technical data")
        || lower.contains("<table")
        || lower.contains("<dl")
}

/// A `.pdf` reference with datasheet/download language nearby.
fn has_datasheet_link(lower: &str) -> bool {
    let mut from = 0;
    while let Some(rel) = lower[from..].find(".pdf") {
        let pos = from + rel;
        let window_start = pos.saturating_sub(300);
        let window_end = (pos + 300).min(lower.len());
        let window = &lower[window_start..window_end];
        if window.contains("datasheet") || window.contains("download") {
            return true;
        }
        from = pos + 4;
    }
    false
}

/// Product-page shape: not a homepage, has a heading, and shows either spec
/// markup or a datasheet link.
#[must_use]
pub fn looks_like_product_page(html: &str) -> bool {
    if looks_like_homepage(html) {
        return false;
    }
    let lower = html.to_lowercase();

    let has_heading = lower.contains("<h1") || lower.contains("<title");
    if !has_heading {
        return false;
    }

    has_spec_markup(&lower) || has_datasheet_link(&lower)
}

/// Count tokens shaped like manufacturer part numbers.
#[must_use]
pub fn count_mpn_like_tokens(html: &str) -> usize {
    MPN_TOKEN_RE.find_iter(html).count()
}

/// Usable-signal check: enough body, and at least one of spec markup, a
/// labelled PDF, or a cluster of MPN-shaped tokens.
#[must_use]
pub fn has_usable_signal(html: &str) -> bool {
    if html.len() <= USABLE_SIGNAL_MIN_LEN {
        return false;
    }
    let lower = html.to_lowercase();

    if lower.contains("<table") || lower.contains("<dl") {
        return true;
    }
    if lower.contains(".pdf") && (lower.contains("datasheet") || lower.contains("manual")) {
        return true;
    }
    count_mpn_like_tokens(html) >= MIN_MPN_LIKE_TOKENS
}
