//! Catalog export adapter.
//!
//! Flattens `FinalResult` records into spreadsheet rows: MPN, Manufacturer,
//! Features (newline-separated bullets), Overview, Technical Specs
//! (`key: value; …`), Description (HTML), Image Link, Datasheet Link.

use crate::model::FinalResult;

const COLUMNS: [&str; 8] = [
    "MPN",
    "Manufacturer",
    "Features",
    "Overview",
    "Technical Specs",
    "Description",
    "Image Link",
    "Datasheet Link",
];

fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Description column: overview and long description as HTML paragraphs,
/// bullet highlights as a list.
fn description_html(result: &FinalResult) -> String {
    let mut html = String::new();
    if !result.overview.is_empty() {
        html.push_str(&format!("<p>{}</p>", escape_html(&result.overview)));
    }
    if !result.long_description.is_empty() && result.long_description != result.overview {
        html.push_str(&format!("<p>{}</p>", escape_html(&result.long_description)));
    }
    if !result.bullet_highlights.is_empty() {
        html.push_str("<ul>");
        for bullet in &result.bullet_highlights {
            html.push_str(&format!("<li>{}</li>", escape_html(bullet)));
        }
        html.push_str("</ul>");
    }
    html
}

fn spec_string(result: &FinalResult) -> String {
    result
        .spec_table
        .iter()
        .map(|row| format!("{}: {}", row.key, row.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Render results as a CSV document with the catalog column layout.
#[must_use]
pub fn to_csv(results: &[FinalResult]) -> String {
    let mut out = String::new();
    out.push_str(&COLUMNS.join(","));
    out.push('\n');

    for result in results {
        let fields = [
            result.mpn.clone(),
            result.manufacturer.clone(),
            result.key_features.join("\n"),
            result.overview.clone(),
            spec_string(result),
            description_html(result),
            result.images.first().cloned().unwrap_or_default(),
            result.datasheets.first().cloned().unwrap_or_default(),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::ConfidenceBreakdown;
    use crate::model::SpecRow;

    fn result_fixture() -> FinalResult {
        FinalResult {
            mpn: "M1-1120-3".into(),
            manufacturer: "SurgePure".into(),
            canonical_title: "M1-1120-3 SPD".into(),
            display_title: "M1-1120-3".into(),
            key_features: vec!["Phase: Single Phase".into(), "Warranty: 10 yr".into()],
            overview: "Protects equipment & panels.".into(),
            short_description: "An SPD.".into(),
            long_description: "Longer text.".into(),
            bullet_highlights: vec!["Thermal protection".into()],
            seo_description: "M1-1120-3".into(),
            disclaimers: Vec::new(),
            spec_table: vec![
                SpecRow {
                    key: "Phase".into(),
                    value: "Single Phase".into(),
                },
                SpecRow {
                    key: "Warranty".into(),
                    value: "10 yr".into(),
                },
            ],
            product_type: Some("Surge Protection Device".into()),
            images: vec!["https://surgepure.com/img/m1.png".into()],
            datasheets: vec!["https://surgepure.com/ds/m1.pdf".into()],
            source_url: Some("https://surgepure.com/m1".into()),
            confidence_breakdown: ConfidenceBreakdown {
                discovery: 0.9,
                crawl: 0.85,
                extraction: 0.9,
                synthesis: 0.85,
            },
            confidence: 0.88,
            usable: true,
            failure_reason: None,
        }
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = to_csv(&[result_fixture()]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        // Features cell contains an embedded newline, so the record spans
        // lines but stays one quoted field.
        assert!(csv.contains("\"Phase: Single Phase\nWarranty: 10 yr\""));
    }

    #[test]
    fn spec_string_joins_with_semicolons() {
        let spec = spec_string(&result_fixture());
        assert_eq!(spec, "Phase: Single Phase; Warranty: 10 yr");
    }

    #[test]
    fn description_escapes_html() {
        let html = description_html(&result_fixture());
        assert!(html.contains("<p>Protects equipment &amp; panels.</p>"));
        assert!(html.contains("<li>Thermal protection</li>"));
    }
}
