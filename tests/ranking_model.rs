//! Ranking-model properties: determinism, tie behavior, and the
//! relative-separation confidence rule.

use partscribe::discovery::ranker::{
    domain_trust, rank, separation_confidence, MIN_USABLE_SCORE,
};
use partscribe::discovery::SearchHit;
use partscribe::StageConfidence;

fn hit(link: &str, title: &str, snippet: &str) -> SearchHit {
    SearchHit {
        link: link.to_string(),
        title: title.to_string(),
        snippet: snippet.to_string(),
    }
}

#[test]
fn zero_results_rank_empty_with_low_confidence() {
    let ranked = rank(&[], "M1-1120-3", "SurgePure");
    assert!(ranked.is_empty());
    assert_eq!(separation_confidence(&ranked), StageConfidence::Low);
}

#[test]
fn one_result_is_high_confidence_and_usable() {
    let ranked = rank(
        &[hit("https://surgepure.com/products/m1-1120-3", "M1-1120-3", "SPD")],
        "M1-1120-3",
        "SurgePure",
    );
    assert_eq!(ranked.len(), 1);
    assert_eq!(separation_confidence(&ranked), StageConfidence::High);
    assert!(ranked[0].score >= MIN_USABLE_SCORE);
}

#[test]
fn identical_feature_vectors_get_identical_scores() {
    let hits: Vec<SearchHit> = (0..4)
        .map(|i| {
            hit(
                &format!("https://mirror{i}.example.com/page"),
                "Generic page",
                "nothing relevant",
            )
        })
        .collect();
    let ranked = rank(&hits, "M1-1120-3", "SurgePure");
    for pair in ranked.windows(2) {
        assert!((pair[0].score - pair[1].score).abs() < 1e-12);
    }
}

#[test]
fn ranking_is_deterministic_across_runs() {
    let hits = vec![
        hit(
            "https://surgepure.com/products/m1-1120-3",
            "M1-1120-3 SPD | SurgePure",
            "SurgePure surge protection",
        ),
        hit(
            "https://forum.circuits.com/thread?q=m1",
            "Help thread",
            "discussion",
        ),
        hit(
            "https://digikey.com/en/products/detail/m1-1120-3",
            "M1-1120-3 - SurgePure",
            "In stock",
        ),
    ];
    let first = rank(&hits, "M1-1120-3", "SurgePure");
    let second = rank(&hits, "M1-1120-3", "SurgePure");
    let first_urls: Vec<&str> = first.iter().map(|c| c.url.as_str()).collect();
    let second_urls: Vec<&str> = second.iter().map(|c| c.url.as_str()).collect();
    assert_eq!(first_urls, second_urls);
}

#[test]
fn junk_hosts_sink_below_product_hosts() {
    let hits = vec![
        hit(
            "https://www.reddit.com/r/electricians/m1-1120-3",
            "M1-1120-3 opinions",
            "SurgePure discussion",
        ),
        hit(
            "https://surgepure.com/products/m1-1120-3",
            "M1-1120-3 | SurgePure",
            "SurgePure SPD",
        ),
    ];
    let ranked = rank(&hits, "M1-1120-3", "SurgePure");
    assert!(ranked[0].url.contains("surgepure.com"));
}

#[test]
fn trust_prior_covers_the_pattern_table() {
    assert!(domain_trust("forum.example.com") < 0.0);
    assert!(domain_trust("myblog.example.com") < 0.0);
    assert!(domain_trust("datasheetarchive.com") < 0.0);
    assert!(domain_trust("mouser.com") > 0.8);
    assert!((domain_trust("acme.io") - 0.4).abs() < f64::EPSILON);
    assert!((domain_trust("sub.domain.example.com")).abs() < f64::EPSILON);
}
