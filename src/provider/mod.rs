//! Gemini API provider: content generation, chat, media, grounding.

pub mod chat;
pub mod generate;
pub mod http;
pub mod media;

pub use chat::CoachChat;
pub use generate::{
    Citation, Content, FinishReason, GenerateRequest, GenerateResponse, Grounding, InlineData,
    Modality, Part, Usage,
};
pub use media::{GeneratedMedia, VideoRequest};

use std::time::Duration;

use crate::config::StrydeConfig;
use crate::error::Result;
use crate::util::retry::RetryPolicy;

const DEFAULT_VIDEO_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Client for the Gemini request/response endpoints.
///
/// The API key is resolved eagerly: construction fails with a configuration
/// error when no key is available, rather than deferring the failure to the
/// first call.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    retry_policy: RetryPolicy,
    video_poll_interval: Duration,
}

impl GeminiClient {
    /// Create a client from an explicit config.
    pub fn new(config: &StrydeConfig) -> Result<Self> {
        Ok(Self {
            api_key: config.resolve_api_key()?,
            base_url: config.base_url().to_string(),
            retry_policy: RetryPolicy::default(),
            video_poll_interval: DEFAULT_VIDEO_POLL_INTERVAL,
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&StrydeConfig::from_env())
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Override the long-running operation poll interval (tests use ms).
    pub fn with_video_poll_interval(mut self, interval: Duration) -> Self {
        self.video_poll_interval = interval;
        self
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub(crate) fn video_poll_interval(&self) -> Duration {
        self.video_poll_interval
    }
}
