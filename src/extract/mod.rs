//! HTML product extraction.
//!
//! Turns crawled HTML into an evidence record: canonical title, spec map,
//! overview, scored image and datasheet links, plus whatever structured
//! metadata the page embeds. The extractor quantifies its own quality and
//! refuses below a floor; it never writes a value it did not see on the
//! page.

pub mod structured;

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::model::{ExtractedProduct, SourceType};

/// Quality floor below which extraction reports `LowQuality`.
pub const QUALITY_FLOOR: f64 = 0.30;

/// Max accepted length for a spec value; longer cells are prose, not specs.
pub const MAX_SPEC_VALUE_LEN: usize = 180;

/// Pages shorter than this with challenge markers are bot interstitials.
const CHALLENGE_PAGE_MAX_LEN: usize = 12000;

const CHALLENGE_MARKERS: [&str; 4] = [
    "__cf_chl",
    "cf-challenge",
    "attention required",
    "verify you are human",
];

/// Why extraction refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractFailure {
    NoHtml,
    Blocked,
    NonProduct,
    ParseError,
    LowQuality,
}

/// Extraction result: success with a quality score, or a tagged refusal
/// that still carries whatever was recovered.
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    Ok {
        product: ExtractedProduct,
        quality: f64,
    },
    Failed {
        reason: ExtractFailure,
        product: Option<ExtractedProduct>,
        quality: f64,
    },
}

impl ExtractOutcome {
    #[must_use]
    pub fn quality(&self) -> f64 {
        match self {
            Self::Ok { quality, .. } | Self::Failed { quality, .. } => *quality,
        }
    }

    #[must_use]
    pub fn product(&self) -> Option<&ExtractedProduct> {
        match self {
            Self::Ok { product, .. } => Some(product),
            Self::Failed { product, .. } => product.as_ref(),
        }
    }
}

/// Inputs for one extraction run.
#[derive(Debug, Clone, Copy)]
pub struct ExtractInput<'a> {
    pub html: &'a str,
    pub source_url: &'a str,
    pub mpn: &'a str,
    pub manufacturer: Option<&'a str>,
}

/// Strip hyphens and spaces and lowercase, so `M1-1120-3` matches
/// `M1 1120 3` and `m111203` alike.
#[must_use]
pub fn normalize_token(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

const DISTRIBUTOR_HOSTS: [&str; 8] = [
    "digikey",
    "mouser",
    "newark",
    "arrow",
    "grainger",
    "galco",
    "rexel",
    "platt",
];

fn url_has_product_markers(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.contains("/product") || DISTRIBUTOR_HOSTS.iter().any(|d| lower.contains(d))
}

/// Classify the evidence source from its URL and the manufacturer name.
#[must_use]
pub fn classify_source(url: &str, manufacturer: &str) -> SourceType {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToString::to_string))
        .unwrap_or_default()
        .to_lowercase();

    if !manufacturer.is_empty() {
        let mfg = normalize_token(manufacturer);
        if !mfg.is_empty() && normalize_token(&host).contains(&mfg) {
            return SourceType::Oem;
        }
    }
    if DISTRIBUTOR_HOSTS.iter().any(|d| host.contains(d)) {
        return SourceType::Distributor;
    }
    SourceType::Unknown
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

/// Resolve a possibly-relative href against the page URL.
fn absolutize(href: &str, base: &str) -> Option<String> {
    if href.starts_with("data:") || href.starts_with("javascript:") || href.starts_with('#') {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(base).ok()?.join(href).ok().map(|u| u.to_string()),
    }
}

fn score_datasheet_link(href: &str, text: &str) -> i32 {
    let href_lower = href.to_lowercase();
    let text_lower = text.to_lowercase();
    let mut score = 0;

    let href_path = href_lower.split(['?', '#']).next().unwrap_or(&href_lower);
    if href_path.ends_with(".pdf") {
        score += 3;
    }
    if text_lower.contains("datasheet") || text_lower.contains("data sheet") {
        score += 2;
    }
    if text_lower.contains("spec") {
        score += 2;
    }
    if text_lower.contains("manual") {
        score += 1;
    }
    if text_lower.contains("privacy") || text_lower.contains("terms") || text_lower.contains("catalog")
    {
        score -= 3;
    }
    score
}

fn collect_datasheets(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    // Dedup by URL, retaining the max score seen; insertion order breaks
    // score ties.
    let mut scored: Vec<(String, i32)> = Vec::new();
    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let score = score_datasheet_link(href, &element_text(anchor));
        if score <= 0 {
            continue;
        }
        let Some(absolute) = absolutize(href, base_url) else {
            continue;
        };
        match scored.iter_mut().find(|(url, _)| *url == absolute) {
            Some((_, existing)) => *existing = (*existing).max(score),
            None => scored.push((absolute, score)),
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(5).map(|(url, _)| url).collect()
}

const IMAGE_REJECT_MARKERS: [&str; 5] = ["logo", "icon", "sprite", "placeholder", "spinner"];
const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];

fn collect_images(document: &Html, base_url: &str) -> Vec<String> {
    let mut scored: Vec<(String, i32)> = Vec::new();

    // The OpenGraph image is the page's own pick; seed it on top.
    if let Some(og_image) = meta_content(document, r#"meta[property="og:image"]"#) {
        if let Some(absolute) = absolutize(&og_image, base_url) {
            scored.push((absolute, 5));
        }
    }

    if let Ok(img_sel) = Selector::parse("img[src]") {
        for img in document.select(&img_sel) {
            let Some(src) = img.value().attr("src") else {
                continue;
            };
            let lower = src.to_lowercase();
            if IMAGE_REJECT_MARKERS.iter().any(|m| lower.contains(m)) {
                continue;
            }
            let mut score = 1;
            if lower.contains("product") || lower.contains("media") {
                score += 2;
            }
            if IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext)) {
                score += 1;
            }
            let Some(absolute) = absolutize(src, base_url) else {
                continue;
            };
            match scored.iter_mut().find(|(url, _)| *url == absolute) {
                Some((_, existing)) => *existing = (*existing).max(score),
                None => scored.push((absolute, score)),
            }
        }
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(3).map(|(url, _)| url).collect()
}

fn collect_table_specs(document: &Html, specs: &mut BTreeMap<String, String>) {
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("td, th"),
    ) else {
        return;
    };

    for table in document.select(&table_sel) {
        let rows: Vec<ElementRef<'_>> = table.select(&row_sel).collect();
        if rows.len() < 3 {
            continue;
        }
        for row in rows {
            let cells: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
            if cells.len() < 2 {
                continue;
            }
            push_spec_pair(specs, &element_text(cells[0]), &element_text(cells[1]));
        }
    }
}

fn collect_dl_specs(document: &Html, specs: &mut BTreeMap<String, String>) {
    let Ok(dl_sel) = Selector::parse("dl") else {
        return;
    };

    for dl in document.select(&dl_sel) {
        let mut pending_key: Option<String> = None;
        for node in dl.children() {
            let Some(child) = ElementRef::wrap(node) else {
                continue;
            };
            match child.value().name() {
                "dt" => pending_key = Some(element_text(child)),
                "dd" => {
                    if let Some(key) = pending_key.take() {
                        push_spec_pair(specs, &key, &element_text(child));
                    }
                }
                _ => {}
            }
        }
    }
}

fn push_spec_pair(specs: &mut BTreeMap<String, String>, key: &str, value: &str) {
    let key = key.trim().trim_end_matches(':').trim();
    let value = value.trim();
    if key.is_empty() || value.is_empty() || value.len() > MAX_SPEC_VALUE_LEN {
        return;
    }
    specs.entry(key.to_string()).or_insert_with(|| value.to_string());
}

fn resolve_titles(
    document: &Html,
    mpn: &str,
    manufacturer: &str,
) -> (Option<String>, Option<String>) {
    let og_title = meta_content(document, r#"meta[property="og:title"]"#);
    let twitter_title = meta_content(document, r#"meta[name="twitter:title"]"#);
    let h1 = first_text(document, "h1");
    let doc_title = first_text(document, "title");

    let display_title = og_title
        .clone()
        .or_else(|| twitter_title.clone())
        .or_else(|| h1.clone())
        .or_else(|| doc_title.clone());

    // Canonical title must name the part. Site names and bare domains never
    // qualify because they cannot contain the normalized MPN.
    let mpn_norm = normalize_token(mpn);
    let canonical = [h1, og_title, doc_title]
        .into_iter()
        .flatten()
        .find(|candidate| normalize_token(candidate).contains(&mpn_norm))
        .or_else(|| {
            let fallback = format!("{manufacturer} {mpn}").trim().to_string();
            (!fallback.is_empty()).then_some(fallback)
        });

    (canonical, display_title)
}

/// Quality score over five binary signals.
#[must_use]
pub fn quality_score(product: &ExtractedProduct, overview: Option<&str>) -> f64 {
    let has_title = product
        .display_title
        .as_deref()
        .is_some_and(|t| t.len() > 15);
    let has_overview = overview.is_some_and(|o| o.len() > 40);

    let mut score = 0.0;
    if has_title {
        score += 0.15;
    }
    if !product.specs.is_empty() {
        score += 0.30;
    }
    if !product.images.is_empty() {
        score += 0.20;
    }
    if !product.datasheets.is_empty() {
        score += 0.25;
    }
    if has_overview {
        score += 0.10;
    }
    score
}

/// Extract a product evidence record from crawled HTML.
///
/// Guardrails run in order: empty body, challenge interstitial, then a
/// page-names-the-part check. After that the page is parsed once and every
/// field is pulled from what is actually present.
#[must_use]
pub fn extract(input: ExtractInput<'_>) -> ExtractOutcome {
    if input.html.trim().is_empty() {
        return ExtractOutcome::Failed {
            reason: ExtractFailure::NoHtml,
            product: None,
            quality: 0.0,
        };
    }

    let lower = input.html.to_lowercase();
    if input.html.len() < CHALLENGE_PAGE_MAX_LEN
        && CHALLENGE_MARKERS.iter().any(|m| lower.contains(m))
    {
        return ExtractOutcome::Failed {
            reason: ExtractFailure::Blocked,
            product: None,
            quality: 0.0,
        };
    }

    let mpn_norm = normalize_token(input.mpn);
    let html_norm = normalize_token(input.html);
    if !html_norm.contains(&mpn_norm) && !url_has_product_markers(input.source_url) {
        return ExtractOutcome::Failed {
            reason: ExtractFailure::NonProduct,
            product: None,
            quality: 0.0,
        };
    }

    let document = Html::parse_document(input.html);

    // Manufacturer: caller-supplied wins; otherwise fall back to the
    // JSON-LD brand, which the page author asserted.
    let json_ld = structured::find_json_ld_product(&document);
    let brand = json_ld
        .as_ref()
        .and_then(|p| p.get("brand"))
        .and_then(|b| b.get("name").or(Some(b)))
        .and_then(Value::as_str)
        .map(str::to_string);
    let manufacturer = input
        .manufacturer
        .map(ToString::to_string)
        .or(brand)
        .unwrap_or_default();

    let mut product = ExtractedProduct::new(
        input.mpn,
        &manufacturer,
        input.source_url,
        classify_source(input.source_url, &manufacturer),
    );

    let (canonical, display) = resolve_titles(&document, input.mpn, &manufacturer);
    product.canonical_title = canonical;
    product.display_title = display;

    // Overview: meta description first, then the JSON-LD description.
    let meta_description = meta_content(&document, r#"meta[name="description"]"#);
    let overview = meta_description.clone().or_else(|| {
        json_ld
            .as_ref()
            .and_then(|p| p.get("description"))
            .and_then(Value::as_str)
            .map(structured::percent_decode)
            .filter(|s| !s.trim().is_empty())
    });
    if let Some(text) = &overview {
        product
            .verbatim_sections
            .push(crate::model::VerbatimSection::new(Some("Overview"), text.clone()));
    }

    product.datasheets = collect_datasheets(&document, input.source_url);
    product.images = collect_images(&document, input.source_url);

    collect_table_specs(&document, &mut product.specs);
    collect_dl_specs(&document, &mut product.specs);

    structured::promote_bcdata(input.html, &mut product);
    let og_description = meta_content(&document, r#"meta[property="og:description"]"#);
    for description in [meta_description.as_deref(), og_description.as_deref()]
        .into_iter()
        .flatten()
    {
        structured::promote_description_specs(description, &mut product);
    }

    let quality = quality_score(&product, overview.as_deref());
    product.confidence = quality;

    debug!(
        url = input.source_url,
        specs = product.specs.len(),
        images = product.images.len(),
        datasheets = product.datasheets.len(),
        quality,
        "extraction complete"
    );

    // Strict less-than: a score of exactly QUALITY_FLOOR passes.
    if quality < QUALITY_FLOOR {
        return ExtractOutcome::Failed {
            reason: ExtractFailure::LowQuality,
            product: Some(product),
            quality,
        };
    }

    ExtractOutcome::Ok { product, quality }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT_PAGE: &str = r#"<!DOCTYPE html><html><head>
        <title>M1-1120-3 Surge Protection Device | SurgePure</title>
        <meta property="og:title" content="SurgePure M1-1120-3">
        <meta name="description" content="Single-phase surge protection device for 120/240V service entrances, rated 200 A for downline panels.">
        <meta property="og:image" content="/media/m1-1120-3-front.png">
        </head><body>
        <h1>M1-1120-3 Surge Protective Device</h1>
        <table>
          <tr><td>Nominal AC Line Voltage (VRMS):</td><td>120/240 V</td></tr>
          <tr><td>Phase</td><td>Single Phase</td></tr>
          <tr><td>Enclosure Size (HxWxD)</td><td>10 x 8 x 4 in</td></tr>
        </table>
        <img src="/img/logo.png">
        <img src="/media/products/m1-1120-3-side.jpg">
        <a href="/docs/m1-1120-3.pdf">Download Datasheet</a>
        <a href="/legal/privacy.pdf">Privacy Policy</a>
        </body></html>"#;

    fn input(html: &str) -> ExtractInput<'_> {
        ExtractInput {
            html,
            source_url: "https://surgepure.com/products/m1-1120-3",
            mpn: "M1-1120-3",
            manufacturer: Some("SurgePure"),
        }
    }

    #[test]
    fn full_page_extracts_everything() {
        let ExtractOutcome::Ok { product, quality } = extract(input(PRODUCT_PAGE)) else {
            panic!("expected successful extraction");
        };

        assert_eq!(
            product.canonical_title.as_deref(),
            Some("M1-1120-3 Surge Protective Device")
        );
        assert_eq!(product.display_title.as_deref(), Some("SurgePure M1-1120-3"));
        assert_eq!(
            product.specs.get("Nominal AC Line Voltage (VRMS)").map(String::as_str),
            Some("120/240 V")
        );
        assert_eq!(product.source_type, SourceType::Oem);

        // Datasheet link kept, privacy PDF rejected by its negative score.
        assert_eq!(product.datasheets.len(), 1);
        assert!(product.datasheets[0].ends_with("/docs/m1-1120-3.pdf"));

        // Logo rejected; OG image ranks first.
        assert_eq!(product.images.len(), 2);
        assert!(product.images[0].contains("m1-1120-3-front"));

        assert!(quality > 0.9);
    }

    #[test]
    fn empty_html_is_no_html() {
        let outcome = extract(input("   "));
        assert!(matches!(
            outcome,
            ExtractOutcome::Failed {
                reason: ExtractFailure::NoHtml,
                ..
            }
        ));
    }

    #[test]
    fn short_challenge_page_is_blocked() {
        let html = "<html><body>Attention Required! __cf_chl verify you are human</body></html>";
        let outcome = extract(input(html));
        assert!(matches!(
            outcome,
            ExtractOutcome::Failed {
                reason: ExtractFailure::Blocked,
                ..
            }
        ));
    }

    #[test]
    fn unrelated_page_is_non_product() {
        let html = "<html><head><title>Weather Today</title></head><body><p>Sunny.</p></body></html>";
        let outcome = extract(ExtractInput {
            html,
            source_url: "https://weather.example.org/today",
            mpn: "M1-1120-3",
            manufacturer: Some("SurgePure"),
        });
        assert!(matches!(
            outcome,
            ExtractOutcome::Failed {
                reason: ExtractFailure::NonProduct,
                ..
            }
        ));
    }

    #[test]
    fn mpn_match_survives_hyphen_variants() {
        let html = "<html><head><title>M1 1120 3 overview</title></head>\
                    <body><h1>M1 1120 3</h1><p>An SPD.</p></body></html>";
        let outcome = extract(ExtractInput {
            html,
            source_url: "https://other.example.org/page",
            mpn: "M1-1120-3",
            manufacturer: Some("SurgePure"),
        });
        // Page names the part (normalized), so the guardrail passes even
        // though the URL has no product markers.
        assert!(!matches!(
            outcome,
            ExtractOutcome::Failed {
                reason: ExtractFailure::NonProduct,
                ..
            }
        ));
    }

    #[test]
    fn low_quality_still_returns_partial_product() {
        let html = "<html><head><title>M1-1120-3</title></head>\
                    <body><h1>M1-1120-3</h1></body></html>";
        let outcome = extract(input(html));
        let ExtractOutcome::Failed {
            reason: ExtractFailure::LowQuality,
            product: Some(product),
            quality,
        } = outcome
        else {
            panic!("expected low-quality refusal with partial product");
        };
        assert!(quality < QUALITY_FLOOR);
        assert_eq!(product.canonical_title.as_deref(), Some("M1-1120-3"));
    }

    #[test]
    fn quality_floor_is_strict() {
        // Exactly one 0.30-weight signal (specs) and nothing else: the
        // strict less-than keeps 0.30 on the passing side.
        let mut product = ExtractedProduct::new("M1", "S", "https://x", SourceType::Unknown);
        product.push_spec("K", "V");
        let quality = quality_score(&product, None);
        assert!((quality - 0.30).abs() < f64::EPSILON);
        assert!(quality >= QUALITY_FLOOR);
    }

    #[test]
    fn canonical_title_never_a_bare_domain() {
        let html = "<html><head><title>surgepure.com</title></head>\
                    <body><h1>Welcome</h1><p>M1-1120-3 in stock</p></body></html>";
        let ExtractOutcome::Failed { product: Some(product), .. } = extract(input(html)) else {
            panic!("expected low-quality outcome with product");
        };
        assert_eq!(product.canonical_title.as_deref(), Some("SurgePure M1-1120-3"));
    }

    #[test]
    fn definition_lists_contribute_specs() {
        let html = r#"<html><head><title>M1-1120-3</title></head><body>
            <h1>M1-1120-3</h1>
            <dl>
              <dt>Warranty</dt><dd>10 years</dd>
              <dt>Weight</dt><dd>12 lb</dd>
            </dl></body></html>"#;
        let outcome = extract(input(html));
        let product = outcome.product().expect("product");
        assert_eq!(product.specs.get("Warranty").map(String::as_str), Some("10 years"));
        assert_eq!(product.specs.get("Weight").map(String::as_str), Some("12 lb"));
    }
}
