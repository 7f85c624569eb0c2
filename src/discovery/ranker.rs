//! Linear ranking model over search results.
//!
//! Candidates are scored with a hand-initialized linear model over six
//! interpretable features, centered per query so the model ranks by
//! *relative* signal rather than absolute keyword density. There are no
//! domain whitelists; the trust prior is a small pattern table.

use url::Url;

use crate::confidence::StageConfidence;
use crate::discovery::SearchHit;

/// Feature weights, in `FeatureVector::as_array` order.
pub const WEIGHTS: [f64; 6] = [4.2, 3.4, 2.6, 2.0, 1.6, -3.8];

/// Score gap between the top two candidates required for high confidence.
pub const HIGH_CONFIDENCE_GAP: f64 = 0.15;
/// Score gap required for medium confidence.
pub const MEDIUM_CONFIDENCE_GAP: f64 = 0.05;

/// Minimum post-squash score for a candidate to be considered usable.
/// A lone candidate scores exactly 0.5 (all features center to zero), so
/// the floor sits well below that.
pub const MIN_USABLE_SCORE: f64 = 0.35;

/// One ranked search result.
#[derive(Debug, Clone)]
pub struct SearchCandidate {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub features: FeatureVector,
    pub score: f64,
}

/// The six interpretable ranking features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    /// MPN substring appears in the URL path.
    pub mpn_in_url: f64,
    /// MPN substring appears in the result title.
    pub mpn_in_title: f64,
    /// Manufacturer substring appears in the title or snippet.
    pub mfg_in_text: f64,
    /// URL path contains a `/product` or `/products` segment.
    pub product_path: f64,
    /// Pattern-based host trust prior.
    pub domain_trust: f64,
    /// Search/query syntax or community-content markers in the URL.
    pub junk_path: f64,
}

impl FeatureVector {
    #[must_use]
    pub fn as_array(&self) -> [f64; 6] {
        [
            self.mpn_in_url,
            self.mpn_in_title,
            self.mfg_in_text,
            self.product_path,
            self.domain_trust,
            self.junk_path,
        ]
    }
}

/// Continuous host trust prior.
///
/// Strong negatives for community and viewer hosts, a strong positive for
/// the major electronics distributors, and a mild positive for hosts shaped
/// like a manufacturer's own domain (exactly two dot-separated labels).
#[must_use]
pub fn domain_trust(host: &str) -> f64 {
    let host = host.to_lowercase();

    if host.contains("forum") || host.contains("reddit") {
        return -0.7;
    }
    if host.contains("blog") {
        return -0.6;
    }
    if host.contains("viewer") {
        return -0.4;
    }
    if host.contains("datasheet") {
        return -0.3;
    }

    const DISTRIBUTORS: [&str; 8] = [
        "digikey.com",
        "mouser.com",
        "newark.com",
        "arrow.com",
        "grainger.com",
        "galco.com",
        "rexel.com",
        "platt.com",
    ];
    if DISTRIBUTORS
        .iter()
        .any(|d| host == *d || host.ends_with(&format!(".{d}")))
    {
        return 0.9;
    }

    // Manufacturer-shaped host: exactly two labels (surgepure.com).
    if host.split('.').filter(|s| !s.is_empty()).count() == 2 {
        return 0.4;
    }

    0.0
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Compute the raw feature vector for one search hit.
#[must_use]
pub fn featurize(hit: &SearchHit, mpn: &str, manufacturer: &str) -> FeatureVector {
    let url_lower = hit.link.to_lowercase();
    let (host, path) = match Url::parse(&hit.link) {
        Ok(parsed) => (
            parsed.host_str().unwrap_or_default().to_string(),
            parsed.path().to_string(),
        ),
        Err(_) => (String::new(), url_lower.clone()),
    };

    let junk_markers = [
        "?q=", "&q=", "/search", "blog", "forum", "reddit", "stackexchange",
    ];

    FeatureVector {
        mpn_in_url: f64::from(contains_ci(&path, mpn)),
        mpn_in_title: f64::from(contains_ci(&hit.title, mpn)),
        mfg_in_text: f64::from(
            contains_ci(&hit.title, manufacturer) || contains_ci(&hit.snippet, manufacturer),
        ),
        product_path: f64::from({
            let path_lower = path.to_lowercase();
            path_lower.contains("/product")
        }),
        domain_trust: domain_trust(&host),
        junk_path: f64::from(junk_markers.iter().any(|m| url_lower.contains(m))),
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Rank hits: featurize, center per query, score, sort descending.
///
/// Ties keep insertion order, so identical feature vectors rank by their
/// original search position.
#[must_use]
pub fn rank(hits: &[SearchHit], mpn: &str, manufacturer: &str) -> Vec<SearchCandidate> {
    if hits.is_empty() {
        return Vec::new();
    }

    let features: Vec<FeatureVector> = hits
        .iter()
        .map(|h| featurize(h, mpn, manufacturer))
        .collect();

    // Per-query feature means for centering.
    let n = features.len() as f64;
    let mut means = [0.0_f64; 6];
    for fv in &features {
        for (m, v) in means.iter_mut().zip(fv.as_array()) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut candidates: Vec<SearchCandidate> = hits
        .iter()
        .zip(features)
        .map(|(hit, fv)| {
            let raw = fv.as_array();
            let dot: f64 = raw
                .iter()
                .zip(means.iter())
                .zip(WEIGHTS.iter())
                .map(|((v, m), w)| (v - m) * w)
                .sum();
            SearchCandidate {
                url: hit.link.clone(),
                title: hit.title.clone(),
                snippet: hit.snippet.clone(),
                features: fv,
                score: logistic(dot),
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates
}

/// Relative-separation confidence over the ranked scores.
///
/// A single candidate is high confidence by definition; otherwise the gap
/// between the top two scores decides. Absolute score is deliberately not
/// consulted.
#[must_use]
pub fn separation_confidence(candidates: &[SearchCandidate]) -> StageConfidence {
    match candidates {
        [] => StageConfidence::Low,
        [_] => StageConfidence::High,
        [first, second, ..] => {
            let gap = first.score - second.score;
            if gap > HIGH_CONFIDENCE_GAP {
                StageConfidence::High
            } else if gap > MEDIUM_CONFIDENCE_GAP {
                StageConfidence::Medium
            } else {
                StageConfidence::Low
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(link: &str, title: &str, snippet: &str) -> SearchHit {
        SearchHit {
            link: link.to_string(),
            title: title.to_string(),
            snippet: snippet.to_string(),
        }
    }

    #[test]
    fn trust_prior_patterns() {
        assert!((domain_trust("forum.allaboutcircuits.com") - -0.7).abs() < f64::EPSILON);
        assert!((domain_trust("blog.example.com") - -0.6).abs() < f64::EPSILON);
        assert!((domain_trust("pdfviewer.io") - -0.4).abs() < f64::EPSILON);
        assert!((domain_trust("alldatasheet.com") - -0.3).abs() < f64::EPSILON);
        assert!((domain_trust("digikey.com") - 0.9).abs() < f64::EPSILON);
        assert!((domain_trust("www.digikey.com") - 0.9).abs() < f64::EPSILON);
        assert!((domain_trust("surgepure.com") - 0.4).abs() < f64::EPSILON);
        assert!((domain_trust("shop.vendor.example.com") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn identical_feature_vectors_score_equally() {
        let hits = vec![
            hit("https://a.example.com/page", "Some page", "text"),
            hit("https://b.example.com/page", "Some page", "text"),
        ];
        let ranked = rank(&hits, "M1-1120-3", "SurgePure");
        assert_eq!(ranked.len(), 2);
        assert!((ranked[0].score - ranked[1].score).abs() < 1e-12);
        // Tie keeps insertion order.
        assert!(ranked[0].url.contains("a.example.com"));
    }

    #[test]
    fn product_page_outranks_forum_thread() {
        let hits = vec![
            hit(
                "https://forum.electronics.com/thread/m1-1120-3-help?q=surge",
                "Help with surge protector",
                "forum discussion",
            ),
            hit(
                "https://surgepure.com/products/m1-1120-3",
                "M1-1120-3 Surge Protection Device | SurgePure",
                "SurgePure M1-1120-3 industrial SPD",
            ),
        ];
        let ranked = rank(&hits, "M1-1120-3", "SurgePure");
        assert!(ranked[0].url.contains("surgepure.com"));
        assert!(ranked[0].score > ranked[1].score + 0.15);
    }

    #[test]
    fn single_candidate_is_high_confidence() {
        let hits = vec![hit("https://surgepure.com/products/m1", "M1", "spd")];
        let ranked = rank(&hits, "M1", "SurgePure");
        assert_eq!(separation_confidence(&ranked), StageConfidence::High);
        // All features center to zero, so the squash lands exactly on 0.5.
        assert!((ranked[0].score - 0.5).abs() < 1e-12);
        assert!(ranked[0].score >= MIN_USABLE_SCORE);
    }

    #[test]
    fn close_scores_are_low_confidence() {
        let hits = vec![
            hit("https://a.example.com/x", "page", "text"),
            hit("https://b.example.com/x", "page", "text"),
        ];
        let ranked = rank(&hits, "ZZZ", "Nobody");
        assert_eq!(separation_confidence(&ranked), StageConfidence::Low);
    }

    #[test]
    fn empty_input_ranks_empty() {
        assert!(rank(&[], "MPN", "Mfg").is_empty());
        assert_eq!(separation_confidence(&[]), StageConfidence::Low);
    }
}
