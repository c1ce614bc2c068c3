//! `generateContent` request/response surface, including grounding.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{parse_sse_data, shared_client, status_to_error};
use super::GeminiClient;
use crate::error::{Result, StrydeError};

/// One conversational content block (role + parts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".into()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("model".into()),
            parts: vec![Part::text(text)],
        }
    }

    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".into()),
            parts,
        }
    }
}

/// A single part of a content block: text or inline media.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

/// Base64 payload with its MIME tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Requested response modality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Text,
    Image,
    Audio,
}

impl Modality {
    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Audio => "AUDIO",
        }
    }
}

/// Grounding tool selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grounding {
    Search,
    Maps { latitude: f64, longitude: f64 },
}

/// Parameters for a `generateContent` call.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Option<String>,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u32>,
    pub thinking_budget: Option<u32>,
    pub response_mime_type: Option<String>,
    pub response_modalities: Vec<Modality>,
    pub voice: Option<String>,
    pub grounding: Option<Grounding>,
}

impl GenerateRequest {
    /// A single user prompt with no extra settings.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content::user_text(text)],
            ..Default::default()
        }
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

/// Token accounting reported by the API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A grounding citation (web or maps source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub uri: String,
    pub title: Option<String>,
}

/// Parsed `generateContent` response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    /// Concatenated text parts of the first candidate.
    pub text: String,
    /// Inline media parts (image/audio responses).
    pub inline_parts: Vec<InlineData>,
    /// Grounding citations, when a grounding tool was requested.
    pub citations: Vec<Citation>,
    pub finish_reason: Option<FinishReason>,
    pub usage: Usage,
}

impl GeminiClient {
    /// Call `generateContent` on the given model.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        if request.contents.is_empty() {
            return Err(StrydeError::InvalidArgument(
                "Generate request must carry at least one content block".into(),
            ));
        }

        self.retry_policy()
            .execute(|| self.generate_content_once(model, request))
            .await
    }

    async fn generate_content_once(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let body = build_request_body(request);
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url(),
            model,
            self.api_key()
        );

        debug!(model, "Gemini generateContent");

        let resp = shared_client().post(&url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: GeminiResponse = resp.json().await?;
        parse_response(data)
    }

    /// Call `streamGenerateContent` and yield text deltas in arrival order.
    pub async fn stream_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<BoxStream<'static, Result<String>>> {
        let body = build_request_body(request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url(),
            model,
            self.api_key()
        );

        debug!(model, "Gemini streamGenerateContent");

        let resp = shared_client().post(&url).json(&body).send().await?;

        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer = String::new();
            futures::pin_mut!(byte_stream);

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(StrydeError::Network(e));
                        break;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim().to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if let Some(data) = parse_sse_data(&line) {
                        if let Ok(resp) = serde_json::from_str::<GeminiResponse>(data) {
                            if let Some(candidate) = resp.candidates.into_iter().next() {
                                for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
                                    if let Some(t) = part.text {
                                        yield Ok(t);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn build_request_body(request: &GenerateRequest) -> serde_json::Value {
    let mut body = serde_json::json!({ "contents": request.contents });
    let obj = body.as_object_mut().unwrap();

    if let Some(ref sys) = request.system_instruction {
        obj.insert(
            "systemInstruction".into(),
            serde_json::json!({ "parts": [{ "text": sys }] }),
        );
    }

    let mut gen_config = serde_json::Map::new();
    if let Some(temp) = request.temperature {
        gen_config.insert("temperature".into(), temp.into());
    }
    if let Some(max) = request.max_output_tokens {
        gen_config.insert("maxOutputTokens".into(), max.into());
    }
    if let Some(budget) = request.thinking_budget {
        gen_config.insert(
            "thinkingConfig".into(),
            serde_json::json!({ "thinkingBudget": budget }),
        );
    }
    if let Some(ref mime) = request.response_mime_type {
        gen_config.insert("responseMimeType".into(), mime.clone().into());
    }
    if !request.response_modalities.is_empty() {
        let modalities: Vec<&str> = request
            .response_modalities
            .iter()
            .map(|m| m.as_str())
            .collect();
        gen_config.insert("responseModalities".into(), serde_json::json!(modalities));
    }
    if let Some(ref voice) = request.voice {
        gen_config.insert(
            "speechConfig".into(),
            serde_json::json!({
                "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
            }),
        );
    }
    if !gen_config.is_empty() {
        obj.insert(
            "generationConfig".into(),
            serde_json::Value::Object(gen_config),
        );
    }

    match request.grounding {
        Some(Grounding::Search) => {
            obj.insert("tools".into(), serde_json::json!([{ "googleSearch": {} }]));
        }
        Some(Grounding::Maps {
            latitude,
            longitude,
        }) => {
            obj.insert("tools".into(), serde_json::json!([{ "googleMaps": {} }]));
            obj.insert(
                "toolConfig".into(),
                serde_json::json!({
                    "retrievalConfig": {
                        "latLng": { "latitude": latitude, "longitude": longitude }
                    }
                }),
            );
        }
        None => {}
    }

    body
}

fn parse_response(data: GeminiResponse) -> Result<GenerateResponse> {
    let usage = data
        .usage_metadata
        .map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        })
        .unwrap_or_default();

    let candidate = data
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| StrydeError::api(200, "No candidates in Gemini response"))?;

    let mut text = String::new();
    let mut inline_parts = Vec::new();

    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(inline) = part.inline_data {
            inline_parts.push(inline);
        }
    }

    let citations = candidate
        .grounding_metadata
        .map(|g| {
            g.grounding_chunks
                .into_iter()
                .filter_map(|chunk| {
                    chunk.web.map(|web| Citation {
                        uri: web.uri,
                        title: web.title,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("STOP") => Some(FinishReason::Stop),
        Some("MAX_TOKENS") => Some(FinishReason::Length),
        Some("SAFETY") => Some(FinishReason::ContentFilter),
        _ => None,
    };

    Ok(GenerateResponse {
        text,
        inline_parts,
        citations,
        finish_reason,
        usage,
    })
}

// Internal Gemini response types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GeminiGroundingChunk>,
}

#[derive(Deserialize)]
struct GeminiGroundingChunk {
    web: Option<GeminiWebSource>,
}

#[derive(Deserialize)]
struct GeminiWebSource {
    uri: String,
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_system_instruction_and_config() {
        let mut request = GenerateRequest::prompt("hello");
        request.system_instruction = Some("be brief".into());
        request.temperature = Some(0.5);
        request.thinking_budget = Some(1024);

        let body = build_request_body(&request);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "be brief"
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(
            body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            1024
        );
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn maps_grounding_sets_tool_and_retrieval_config() {
        let mut request = GenerateRequest::prompt("gyms near me");
        request.grounding = Some(Grounding::Maps {
            latitude: 40.7,
            longitude: -74.0,
        });

        let body = build_request_body(&request);
        assert!(body["tools"][0].get("googleMaps").is_some());
        assert_eq!(
            body["toolConfig"]["retrievalConfig"]["latLng"]["latitude"],
            40.7
        );
    }

    #[test]
    fn audio_modality_and_voice_build_speech_config() {
        let mut request = GenerateRequest::prompt("say hi");
        request.response_modalities = vec![Modality::Audio];
        request.voice = Some("Kore".into());

        let body = build_request_body(&request);
        assert_eq!(body["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            body["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn response_parsing_collects_text_inline_and_citations() {
        let raw = serde_json::json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Drink " },
                    { "text": "water." },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "YWJj" } }
                ]},
                "finishReason": "STOP",
                "groundingMetadata": {
                    "groundingChunks": [
                        { "web": { "uri": "https://example.com", "title": "Example" } },
                        { "other": {} }
                    ]
                }
            }],
            "usageMetadata": {
                "promptTokenCount": 3,
                "candidatesTokenCount": 5,
                "totalTokenCount": 8
            }
        });
        let parsed: GeminiResponse = serde_json::from_value(raw).unwrap();
        let response = parse_response(parsed).unwrap();

        assert_eq!(response.text, "Drink water.");
        assert_eq!(response.inline_parts.len(), 1);
        assert_eq!(response.citations.len(), 1);
        assert_eq!(response.citations[0].uri, "https://example.com");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.total_tokens, 8);
    }

    #[test]
    fn empty_candidates_is_an_api_error() {
        let parsed: GeminiResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(
            parse_response(parsed),
            Err(StrydeError::Api { .. })
        ));
    }
}
