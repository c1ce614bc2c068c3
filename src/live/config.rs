//! Live session configuration.

use std::env;
use std::time::Duration;

use crate::error::{Result, StrydeError};

/// Default live model (native audio dialog).
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

const DEFAULT_BASE_URL: &str = "wss://generativelanguage.googleapis.com/ws/\
     google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
const DEFAULT_VOICE: &str = "Zephyr";

const COACH_SYSTEM_INSTRUCTION: &str = "You are a friendly and helpful fitness coach.";

/// Configuration for a live voice session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    /// Prebuilt voice profile for synthesized replies.
    pub voice: String,
    pub system_instruction: String,
    /// Explicit key; falls back to `GEMINI_API_KEY` / `GOOGLE_API_KEY`.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Capture rate in Hz (frames are tagged with this rate).
    pub input_sample_rate: u32,
    /// Expected playback rate in Hz.
    pub output_sample_rate: u32,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
    pub heartbeat_interval: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: COACH_SYSTEM_INSTRUCTION.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
            transcribe_input: true,
            transcribe_output: true,
            heartbeat_interval: Duration::from_secs(15),
        }
    }
}

impl LiveConfig {
    /// The coach-persona config with an explicit key.
    pub fn coach(api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self
            .api_key
            .clone()
            .filter(|value| !value.trim().is_empty())
        {
            return Ok(key);
        }
        for var in ["GEMINI_API_KEY", "GOOGLE_API_KEY"] {
            if let Ok(key) = env::var(var) {
                if !key.trim().is_empty() {
                    return Ok(key);
                }
            }
        }
        Err(StrydeError::Authentication(
            "Missing GEMINI_API_KEY for live session".into(),
        ))
    }
}
