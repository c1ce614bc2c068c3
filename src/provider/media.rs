//! Media endpoints: image generation/editing, speech synthesis, video.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use super::generate::{Content, GenerateRequest, InlineData, Modality, Part};
use super::http::{shared_client, status_to_error};
use super::GeminiClient;
use crate::error::{Result, StrydeError};

/// Decoded media payload with its MIME type.
#[derive(Debug, Clone)]
pub struct GeneratedMedia {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Parameters for long-running video generation.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    /// "16:9" or "9:16".
    pub aspect_ratio: String,
    pub resolution: String,
    /// Optional reference image to animate.
    pub reference_image: Option<InlineData>,
}

impl VideoRequest {
    pub fn new(prompt: impl Into<String>, aspect_ratio: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            aspect_ratio: aspect_ratio.into(),
            resolution: "720p".into(),
            reference_image: None,
        }
    }

    pub fn with_reference_image(mut self, image: InlineData) -> Self {
        self.reference_image = Some(image);
        self
    }
}

impl GeminiClient {
    /// Generate a single image via an Imagen `:predict` model.
    pub async fn generate_image(
        &self,
        model: &str,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedMedia> {
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "outputMimeType": "image/jpeg",
                "aspectRatio": aspect_ratio,
            }
        });
        let url = format!(
            "{}/models/{}:predict?key={}",
            self.base_url(),
            model,
            self.api_key()
        );

        debug!(model, aspect_ratio, "Gemini image generation");

        let resp = shared_client().post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: PredictResponse = resp.json().await?;
        let prediction = data
            .predictions
            .into_iter()
            .next()
            .ok_or_else(|| StrydeError::api(200, "No predictions in image response"))?;

        let bytes = BASE64
            .decode(prediction.bytes_base64_encoded.as_bytes())
            .map_err(|e| StrydeError::Decode(format!("Image payload is not valid base64: {e}")))?;

        Ok(GeneratedMedia {
            mime_type: prediction
                .mime_type
                .unwrap_or_else(|| "image/jpeg".to_string()),
            bytes,
        })
    }

    /// Edit an image with a text prompt (image-capable flash model).
    pub async fn edit_image(
        &self,
        model: &str,
        image: InlineData,
        prompt: &str,
    ) -> Result<GeneratedMedia> {
        let request = GenerateRequest {
            contents: vec![Content::user_parts(vec![
                Part {
                    text: None,
                    inline_data: Some(image),
                },
                Part::text(prompt),
            ])],
            response_modalities: vec![Modality::Image],
            ..Default::default()
        };

        let response = self.generate_content(model, &request).await?;
        let part = response
            .inline_parts
            .into_iter()
            .next()
            .ok_or_else(|| StrydeError::api(200, "No image data in edit response"))?;
        decode_inline(part)
    }

    /// Synthesize speech for the given text with a prebuilt voice.
    pub async fn synthesize_speech(
        &self,
        model: &str,
        text: &str,
        voice: &str,
    ) -> Result<GeneratedMedia> {
        let request = GenerateRequest {
            contents: vec![Content::user_text(text)],
            response_modalities: vec![Modality::Audio],
            voice: Some(voice.to_string()),
            ..Default::default()
        };

        let response = self.generate_content(model, &request).await?;
        let part = response
            .inline_parts
            .into_iter()
            .next()
            .ok_or_else(|| StrydeError::api(200, "No audio data in speech response"))?;
        decode_inline(part)
    }

    /// Generate a video: start the long-running operation, poll until done,
    /// then download the produced bytes.
    pub async fn generate_video(&self, model: &str, request: &VideoRequest) -> Result<Vec<u8>> {
        let mut instance = serde_json::json!({ "prompt": request.prompt });
        if let Some(ref image) = request.reference_image {
            instance["image"] = serde_json::json!({
                "bytesBase64Encoded": image.data,
                "mimeType": image.mime_type,
            });
        }
        let body = serde_json::json!({
            "instances": [instance],
            "parameters": {
                "sampleCount": 1,
                "resolution": request.resolution,
                "aspectRatio": request.aspect_ratio,
            }
        });
        let url = format!(
            "{}/models/{}:predictLongRunning?key={}",
            self.base_url(),
            model,
            self.api_key()
        );

        debug!(model, "Gemini video generation start");

        let resp = shared_client().post(&url).json(&body).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let started: OperationResponse = resp.json().await?;
        let operation = started.name.ok_or_else(|| {
            StrydeError::api(200, "Video generation did not return an operation name")
        })?;

        let uri = self.poll_video_operation(&operation).await?;
        self.download_video(&uri).await
    }

    async fn poll_video_operation(&self, operation: &str) -> Result<String> {
        let url = format!(
            "{}/{}?key={}",
            self.base_url(),
            operation.trim_start_matches('/'),
            self.api_key()
        );

        loop {
            let resp = shared_client().get(&url).send().await?;
            let status = resp.status().as_u16();
            if status != 200 {
                let body_text = resp.text().await.unwrap_or_default();
                return Err(status_to_error(status, &body_text));
            }

            let state: OperationResponse = resp.json().await?;
            if state.done {
                let uri = state
                    .response
                    .and_then(|r| r.generate_video_response)
                    .and_then(|v| v.generated_samples.into_iter().next())
                    .and_then(|s| s.video)
                    .map(|v| v.uri);
                return uri.ok_or_else(|| {
                    StrydeError::api(
                        200,
                        "Video generation completed but no download link was found",
                    )
                });
            }

            debug!(operation, "Video generation still running");
            tokio::time::sleep(self.video_poll_interval()).await;
        }
    }

    async fn download_video(&self, uri: &str) -> Result<Vec<u8>> {
        let separator = if uri.contains('?') { "&" } else { "?" };
        let url = format!("{uri}{separator}key={}", self.api_key());

        let resp = shared_client().get(&url).send().await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

fn decode_inline(part: InlineData) -> Result<GeneratedMedia> {
    let bytes = BASE64
        .decode(part.data.as_bytes())
        .map_err(|e| StrydeError::Decode(format!("Inline payload is not valid base64: {e}")))?;
    Ok(GeneratedMedia {
        mime_type: part.mime_type,
        bytes,
    })
}

// Internal wire types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: String,
    mime_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    name: Option<String>,
    #[serde(default)]
    done: bool,
    response: Option<OperationResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationResult {
    generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
    #[serde(default)]
    generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
    video: Option<VideoHandle>,
}

#[derive(Deserialize)]
struct VideoHandle {
    uri: String,
}
