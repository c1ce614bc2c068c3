//! Configuration (explicit values > environment).

use std::env;

use crate::error::{Result, StrydeError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for the API key, in order.
const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Configuration for the Gemini-backed client surfaces.
///
/// Resolution order for the API key: explicit value, then `GEMINI_API_KEY`,
/// then `GOOGLE_API_KEY`. A `.env` file is honored when present.
#[derive(Debug, Clone)]
pub struct StrydeConfig {
    api_key: Option<String>,
    base_url: String,
}

impl Default for StrydeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StrydeConfig {
    /// Create an empty config (no key; resolution falls through to env).
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Load from environment variables (`GEMINI_API_KEY` / `GOOGLE_API_KEY`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();
        for var in API_KEY_ENV_VARS {
            if let Ok(key) = env::var(var) {
                if !key.trim().is_empty() {
                    config.api_key = Some(key);
                    break;
                }
            }
        }
        if let Ok(url) = env::var("GEMINI_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        config
    }

    /// Set an explicit API key (takes precedence over env).
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the API base URL (used by tests against local servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// The configured base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Resolve the API key or fail with a configuration error.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self
            .api_key
            .clone()
            .filter(|value| !value.trim().is_empty())
        {
            return Ok(key);
        }
        for var in API_KEY_ENV_VARS {
            if let Ok(key) = env::var(var) {
                if !key.trim().is_empty() {
                    return Ok(key);
                }
            }
        }
        Err(StrydeError::Configuration(format!(
            "No API key configured (set {} or {})",
            API_KEY_ENV_VARS[0], API_KEY_ENV_VARS[1]
        )))
    }
}
