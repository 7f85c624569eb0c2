//! Datasheet PDF extraction.
//!
//! Downloads a datasheet, reconstructs the spec table that PDF text
//! extraction fractures, and delegates the per-model column mapping to the
//! LLM under a strict JSON contract. See [`repair`] for the text surgery
//! and [`table`] for the row assembly.

pub mod repair;
pub mod table;

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::CHROME_USER_AGENT;
use crate::error::{EnrichError, Result};
use crate::llm::LlmClient;
use crate::model::{ExtractedProduct, SourceType, VerbatimSection};

pub use table::{DatasheetParse, RawSpecRow, MIN_SPEC_ROWS};

/// Per-model spec mapping returned by the LLM.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MappedDatasheet {
    pub model: String,
    /// Normalized spec name → value with units, or `None` for N/A columns.
    pub specs: BTreeMap<String, Option<String>>,
}

/// Download a datasheet PDF with browser-like headers.
///
/// Some OEM CDNs reject anything without a narrow `Accept`; others reject
/// the narrow one. On 403 the request is retried once with `Accept: */*`.
pub async fn download_pdf(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let attempt = |accept: &'static str| {
        client
            .get(url)
            .header("User-Agent", CHROME_USER_AGENT)
            .header("Accept", accept)
            .send()
    };

    let mut response = attempt("application/pdf,application/octet-stream;q=0.9")
        .await
        .map_err(|e| EnrichError::PdfDownload {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if response.status() == reqwest::StatusCode::FORBIDDEN {
        debug!(url, "403 on narrow accept header, retrying permissive");
        response = attempt("*/*").await.map_err(|e| EnrichError::PdfDownload {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    }

    let status = response.status();
    if !status.is_success() {
        return Err(EnrichError::PdfDownload {
            url: url.to_string(),
            message: format!("HTTP {status}"),
        });
    }

    let bytes = response.bytes().await.map_err(|e| EnrichError::PdfDownload {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(bytes.to_vec())
}

/// Extract text from PDF bytes.
pub fn pdf_to_text(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| EnrichError::PdfText(e.to_string()))
}

/// Download and parse a datasheet, without the LLM mapping step.
///
/// Returns the parse together with the raw bytes so callers can cache the
/// PDF without a second download.
pub async fn fetch_and_parse(
    client: &reqwest::Client,
    url: &str,
) -> Result<(DatasheetParse, Vec<u8>)> {
    let bytes = download_pdf(client, url).await?;
    let text = pdf_to_text(&bytes)?;
    let parse = table::parse_datasheet_text(&text)?;
    info!(
        url,
        models = parse.detected_models.len(),
        rows = parse.raw_rows.len(),
        "datasheet parsed"
    );
    Ok((parse, bytes))
}

fn mapping_prompt(parse: &DatasheetParse, target_model: &str) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(
        "You are mapping a surge-protection datasheet spec table to a single model.\n\
         The table below was reconstructed from a PDF; each row holds a spec label\n\
         and the raw value columns for every model, in the order of the model list.\n\n",
    );
    prompt.push_str(&format!(
        "Models (column order): {}\n",
        parse.detected_models.join(", ")
    ));
    prompt.push_str(&format!("Target model: {target_model}\n\nRows:\n"));
    for row in &parse.raw_rows {
        prompt.push_str(&format!("{} | {}\n", row.key, row.raw));
    }
    prompt.push_str(&format!(
        "\nReturn ONLY a JSON object of the shape\n\
         {{\"model\": \"{target_model}\", \"specs\": {{\"<spec name>\": \"<value>\" | null}}}}.\n\
         Rules: normalize spec names to readable title case; extract ONLY the\n\
         target model's column; preserve units exactly as printed; use null when\n\
         the cell reads N/A or is missing; never invent values.\n"
    ));
    prompt
}

/// Map the parsed table onto one target model via the LLM.
///
/// Uses the provided target, else the first detected model.
pub async fn map_to_model(
    llm: &LlmClient,
    parse: &DatasheetParse,
    target_model: Option<&str>,
) -> Result<MappedDatasheet> {
    let target = match target_model {
        Some(model) => model.to_string(),
        None => parse
            .detected_models
            .first()
            .cloned()
            .ok_or_else(|| EnrichError::Other("datasheet exposed no models to map".to_string()))?,
    };

    let response = llm.generate_structured(&mapping_prompt(parse, &target)).await?;

    let model = response
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or(&target)
        .to_string();

    let mut specs = BTreeMap::new();
    if let Some(map) = response.get("specs").and_then(Value::as_object) {
        for (key, value) in map {
            let entry = match value {
                Value::Null => None,
                Value::String(s) if s.trim().is_empty() => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string()),
            };
            specs.insert(key.clone(), entry);
        }
    }

    if specs.is_empty() {
        return Err(EnrichError::LlmParse(
            "datasheet mapping returned no specs".to_string(),
        ));
    }

    Ok(MappedDatasheet { model, specs })
}

/// Package a parsed+mapped datasheet as pipeline evidence.
#[must_use]
pub fn to_extracted_product(
    parse: &DatasheetParse,
    mapped: &MappedDatasheet,
    mpn: &str,
    manufacturer: &str,
    source_url: &str,
) -> ExtractedProduct {
    let mut product = ExtractedProduct::new(mpn, manufacturer, source_url, SourceType::Pdf);
    product.confidence = 0.9;
    product.datasheets.push(source_url.to_string());

    for (key, value) in &mapped.specs {
        if let Some(value) = value {
            product.push_spec(key, value);
        }
    }

    if !parse.overview_text.is_empty() {
        product
            .verbatim_sections
            .push(VerbatimSection::new(Some("Overview"), parse.overview_text.clone()));
    }
    for feature in &parse.features {
        product
            .verbatim_sections
            .push(VerbatimSection::new(Some("Key Feature"), feature.clone()));
    }
    for bullet in &parse.sidebar_bullets {
        product
            .verbatim_sections
            .push(VerbatimSection::new(Some("Callout"), bullet.clone()));
    }

    product
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_fixture() -> DatasheetParse {
        DatasheetParse {
            detected_models: vec!["M1-1120-3".into(), "M1-1480-3".into()],
            raw_rows: vec![
                RawSpecRow {
                    key: "Warranty".into(),
                    raw: "10 yr 10 yr".into(),
                },
                RawSpecRow {
                    key: "Nominal AC Line Voltage (VRMS)".into(),
                    raw: "120/240 480".into(),
                },
            ],
            features: vec!["Thermally protected MOV arrays".into()],
            overview_text: "Isolates downline equipment.".into(),
            sidebar_bullets: vec!["Type 1 SPD!".into()],
            raw_text: String::new(),
        }
    }

    #[test]
    fn prompt_carries_models_rows_and_contract() {
        let prompt = mapping_prompt(&parse_fixture(), "M1-1480-3");
        assert!(prompt.contains("M1-1120-3, M1-1480-3"));
        assert!(prompt.contains("Target model: M1-1480-3"));
        assert!(prompt.contains("Warranty | 10 yr 10 yr"));
        assert!(prompt.contains("never invent values"));
    }

    #[test]
    fn mapped_specs_become_evidence() {
        let mapped = MappedDatasheet {
            model: "M1-1480-3".into(),
            specs: BTreeMap::from([
                ("Warranty".to_string(), Some("10 yr".to_string())),
                ("Remote Alarm".to_string(), None),
            ]),
        };
        let product = to_extracted_product(
            &parse_fixture(),
            &mapped,
            "M1-1480-3",
            "SurgePure",
            "https://surgepure.com/ds/m1.pdf",
        );
        assert_eq!(product.source_type, SourceType::Pdf);
        assert_eq!(product.specs.get("Warranty").map(String::as_str), Some("10 yr"));
        // Null cells never become spec values.
        assert!(!product.specs.contains_key("Remote Alarm"));
        assert_eq!(product.verbatim_sections.len(), 3);
        assert_eq!(product.datasheets, vec!["https://surgepure.com/ds/m1.pdf"]);
    }
}
