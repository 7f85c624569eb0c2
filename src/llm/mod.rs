//! LLM endpoint client.
//!
//! Both the datasheet column mapper and the synthesis stage call the same
//! generative-text endpoint with strict JSON contracts, so the HTTP shape
//! and the tolerant response parsing live behind one seam:
//! [`LlmClient::generate_structured`].

pub mod json_extract;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::EnrichConfig;
use crate::error::{EnrichError, Result};

pub use json_extract::extract_json_object;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    /// Zero temperature: both callers need deterministic output.
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Client for the generative-text endpoint.
pub struct LlmClient {
    client: reqwest::Client,
    endpoint_base: String,
    model: String,
    api_key: String,
}

impl LlmClient {
    #[must_use]
    pub fn new(config: &EnrichConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint_base: config.llm_endpoint_base_url().to_string(),
            model: config.llm_model_name().to_string(),
            api_key: config.llm_api_key_value().to_string(),
        }
    }

    /// Send a prompt and return the raw candidate text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint_base, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature: 0.0 },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EnrichError::LlmHttp(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EnrichError::LlmHttp(format!("{status}: {text}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::LlmHttp(format!("malformed response: {e}")))?;

        let answer: String = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("\n");

        if answer.trim().is_empty() {
            return Err(EnrichError::LlmHttp("response had no text candidates".to_string()));
        }

        debug!(chars = answer.len(), "llm response received");
        Ok(answer)
    }

    /// Send a prompt that demands a JSON object and parse the response
    /// tolerantly.
    pub async fn generate_structured(&self, prompt: &str) -> Result<Value> {
        let text = self.generate(prompt).await?;
        extract_json_object(&text)
    }
}
