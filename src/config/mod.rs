//! Pipeline configuration.
//!
//! `EnrichConfig` carries the API keys, tenant identity, cache root, and
//! timeout knobs that the stages share. Keys come from the environment at
//! construction time; everything else has defaults that can be overridden
//! through the fluent setters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Environment variable holding the search-proxy API key.
pub const SEARCH_API_KEY_VAR: &str = "SEARCH_API_KEY";
/// Environment variable holding the LLM API key.
pub const LLM_API_KEY_VAR: &str = "LLM_API_KEY";
/// Optional override for the LLM model name.
pub const LLM_MODEL_VAR: &str = "LLM_MODEL";

/// Default LLM model when `LLM_MODEL` is unset.
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.0-flash";

/// Tier-1 fetch deadline per attempt.
pub const FETCH_TIMEOUT_SECS: u64 = 10;
/// Number of tier-1 fetch attempts before escalating.
pub const FETCH_ATTEMPTS: u32 = 2;
/// Tier-2 headless navigation deadline.
pub const NAVIGATION_TIMEOUT_SECS: u64 = 20;

/// User agent presented by the tier-1 fetcher and the headless browser
/// alike. Kept on a current Chrome stable so fetches blend in with real
/// traffic.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub(crate) search_api_key: String,
    pub(crate) llm_api_key: String,
    pub(crate) llm_model: String,
    pub(crate) search_endpoint: String,
    pub(crate) llm_endpoint_base: String,
    pub(crate) tenant: String,
    pub(crate) data_dir: PathBuf,
    pub(crate) fetch_timeout_secs: u64,
    pub(crate) navigation_timeout_secs: u64,
}

impl EnrichConfig {
    /// Build a config from the environment.
    ///
    /// Fails when either API key is missing; every other field has a
    /// default.
    pub fn from_env() -> Result<Self> {
        let search_api_key = std::env::var(SEARCH_API_KEY_VAR)
            .with_context(|| format!("{SEARCH_API_KEY_VAR} is not set"))?;
        let llm_api_key = std::env::var(LLM_API_KEY_VAR)
            .with_context(|| format!("{LLM_API_KEY_VAR} is not set"))?;
        let llm_model =
            std::env::var(LLM_MODEL_VAR).unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());

        Ok(Self::new(search_api_key, llm_api_key).llm_model(llm_model))
    }

    /// Build a config with explicit keys (tests, embedding callers).
    #[must_use]
    pub fn new(search_api_key: impl Into<String>, llm_api_key: impl Into<String>) -> Self {
        Self {
            search_api_key: search_api_key.into(),
            llm_api_key: llm_api_key.into(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            search_endpoint: "https://google.serper.dev/search".to_string(),
            llm_endpoint_base: "https://generativelanguage.googleapis.com/v1beta/models"
                .to_string(),
            tenant: "default".to_string(),
            data_dir: PathBuf::from("data"),
            fetch_timeout_secs: FETCH_TIMEOUT_SECS,
            navigation_timeout_secs: NAVIGATION_TIMEOUT_SECS,
        }
    }

    #[must_use]
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = model.into();
        self
    }

    #[must_use]
    pub fn search_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.search_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn llm_endpoint_base(mut self, endpoint: impl Into<String>) -> Self {
        self.llm_endpoint_base = endpoint.into();
        self
    }

    #[must_use]
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.fetch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn navigation_timeout_secs(mut self, secs: u64) -> Self {
        self.navigation_timeout_secs = secs;
        self
    }

    // Getters

    #[must_use]
    pub fn search_api_key_value(&self) -> &str {
        &self.search_api_key
    }

    #[must_use]
    pub fn llm_api_key_value(&self) -> &str {
        &self.llm_api_key
    }

    #[must_use]
    pub fn llm_model_name(&self) -> &str {
        &self.llm_model
    }

    #[must_use]
    pub fn search_endpoint_url(&self) -> &str {
        &self.search_endpoint
    }

    #[must_use]
    pub fn llm_endpoint_base_url(&self) -> &str {
        &self.llm_endpoint_base
    }

    #[must_use]
    pub fn tenant_name(&self) -> &str {
        &self.tenant
    }

    #[must_use]
    pub fn data_root(&self) -> &Path {
        &self.data_dir
    }
}
