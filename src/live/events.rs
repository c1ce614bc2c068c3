//! Live session event types.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use super::playback::InboundAudioFragment;

const DEFAULT_OUTPUT_RATE: u32 = 24_000;
const DEFAULT_OUTPUT_CHANNELS: u16 = 1;

/// Events in a live voice session, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    /// The channel finished setup; capture may begin.
    Ready,
    /// One chunk of synthesized audio.
    AudioFragment(InboundAudioFragment),
    /// Partial transcription of the user's speech.
    InputTranscript(String),
    /// Partial transcription of the model's reply.
    OutputTranscript(String),
    /// The current turn is complete.
    TurnComplete,
    /// A server-reported error; does not by itself end the session.
    ServerError { message: String },
    /// Terminal: the channel is gone.
    Closed,
}

impl LiveEvent {
    /// Parse a server payload into typed events.
    ///
    /// One payload may yield several events (audio, both transcripts, and a
    /// turn completion can share a message); intra-message order is audio,
    /// input transcript, output transcript, turn completion.
    pub fn from_server_payload(payload: &Value) -> Vec<LiveEvent> {
        let mut events = Vec::new();

        if payload.get("setupComplete").is_some() {
            events.push(LiveEvent::Ready);
        }

        if let Some(content) = payload.get("serverContent") {
            if let Some(parts) = content
                .get("modelTurn")
                .and_then(|turn| turn.get("parts"))
                .and_then(Value::as_array)
            {
                for part in parts {
                    if let Some(inline) = part.get("inlineData") {
                        match parse_audio_fragment(inline) {
                            Some(fragment) => events.push(LiveEvent::AudioFragment(fragment)),
                            None => events.push(LiveEvent::ServerError {
                                message: "Undecodable inline audio fragment".to_string(),
                            }),
                        }
                    }
                }
            }

            if let Some(text) = string_at(content, &["inputTranscription", "text"]) {
                events.push(LiveEvent::InputTranscript(text));
            }
            if let Some(text) = string_at(content, &["outputTranscription", "text"]) {
                events.push(LiveEvent::OutputTranscript(text));
            }
            if content
                .get("turnComplete")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                events.push(LiveEvent::TurnComplete);
            }
        }

        if let Some(error) = payload.get("error") {
            events.push(LiveEvent::ServerError {
                message: string_at(error, &["message"])
                    .unwrap_or_else(|| "Live server error".to_string()),
            });
        }

        events
    }
}

fn parse_audio_fragment(inline: &Value) -> Option<InboundAudioFragment> {
    let data = inline.get("data").and_then(Value::as_str)?;
    let bytes = BASE64.decode(data.as_bytes()).ok()?;
    let mime = inline
        .get("mimeType")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let (sample_rate, channels) = pcm_layout_from_mime(mime);
    Some(InboundAudioFragment {
        data: bytes,
        sample_rate,
        channels,
    })
}

/// Extract rate/channels from a tag like `audio/pcm;rate=24000`.
fn pcm_layout_from_mime(mime: &str) -> (u32, u16) {
    let mut rate = DEFAULT_OUTPUT_RATE;
    let mut channels = DEFAULT_OUTPUT_CHANNELS;
    for param in mime.split(';').skip(1) {
        let mut kv = param.trim().splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("rate"), Some(value)) => {
                if let Ok(parsed) = value.parse() {
                    rate = parsed;
                }
            }
            (Some("channels"), Some(value)) => {
                if let Ok(parsed) = value.parse() {
                    channels = parsed;
                }
            }
            _ => {}
        }
    }
    (rate, channels)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str().map(ToString::to_string)
}
