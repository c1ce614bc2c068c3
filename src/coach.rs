//! Fitness-coach service layer on top of the Gemini provider.

use serde::Deserialize;

use crate::error::{Result, StrydeError};
use crate::provider::{
    Citation, CoachChat, GeminiClient, GenerateRequest, GeneratedMedia, Grounding, InlineData,
    VideoRequest,
};

const TIP_MODEL: &str = "gemini-2.5-flash-lite";
const CHAT_MODEL: &str = "gemini-2.5-flash";
const REASONING_MODEL: &str = "gemini-2.5-pro";
const IMAGE_MODEL: &str = "imagen-4.0-generate-001";
const IMAGE_EDIT_MODEL: &str = "gemini-2.5-flash-image";
const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

const MEAL_PLAN_THINKING_BUDGET: u32 = 32_768;
const TTS_VOICE: &str = "Kore";

const CHAT_SYSTEM_INSTRUCTION: &str = "You are a friendly and encouraging fitness and nutrition \
     coach. Provide helpful, safe, and motivating advice. Keep your answers concise unless asked \
     for details.";

/// Estimated nutrition facts for a photographed meal.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MealAnalysis {
    pub dish_name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub description: String,
}

/// A grounded answer with its citations.
#[derive(Debug, Clone)]
pub struct GroundedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// High-level coaching operations.
#[derive(Debug, Clone)]
pub struct CoachService {
    client: GeminiClient,
}

impl CoachService {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Create from environment configuration; fails fast when no key resolves.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(GeminiClient::from_env()?))
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }

    /// A short, actionable fitness or nutrition tip.
    pub async fn quick_tip(&self) -> Result<String> {
        let request = GenerateRequest::prompt(
            "Give me a short, actionable fitness or nutrition tip. Make it concise and easy to \
             understand.",
        );
        let response = self.client.generate_content(TIP_MODEL, &request).await?;
        Ok(response.text)
    }

    /// A meal plan built from the user's stated goals.
    pub async fn meal_plan(&self, goals: &str) -> Result<String> {
        let mut request = GenerateRequest::prompt(goals);
        request.thinking_budget = Some(MEAL_PLAN_THINKING_BUDGET);
        let response = self
            .client
            .generate_content(REASONING_MODEL, &request)
            .await?;
        Ok(response.text)
    }

    /// Analyze a meal photo into estimated nutrition facts.
    pub async fn analyze_meal(&self, image: InlineData) -> Result<MealAnalysis> {
        let mut request = GenerateRequest {
            contents: vec![crate::provider::Content::user_parts(vec![
                crate::provider::Part {
                    text: None,
                    inline_data: Some(image),
                },
                crate::provider::Part::text(
                    "Analyze this image of a meal. Identify the food items and estimate the total \
                     calories and macronutrients (protein, carbs, fat). Return the response as a \
                     JSON object with keys: \"dishName\", \"calories\", \"protein\", \"carbs\", \
                     \"fat\", and \"description\".",
                ),
            ])],
            ..Default::default()
        };
        request.response_mime_type = Some("application/json".into());

        let response = self.client.generate_content(CHAT_MODEL, &request).await?;
        parse_meal_analysis(&response.text)
    }

    /// Form feedback for a described workout.
    pub async fn workout_form_feedback(&self, description: &str) -> Result<String> {
        let request = GenerateRequest::prompt(format!(
            "A user has uploaded a video of their workout. Based on their description, provide \
             detailed feedback on their form for the exercise. Description: \"{description}\". Be \
             encouraging and provide 2-3 actionable tips for improvement."
        ));
        let response = self
            .client
            .generate_content(REASONING_MODEL, &request)
            .await?;
        Ok(response.text)
    }

    /// Generate a motivational image.
    pub async fn motivation_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedMedia> {
        self.client
            .generate_image(IMAGE_MODEL, prompt, aspect_ratio)
            .await
    }

    /// Edit an uploaded image with a prompt.
    pub async fn edit_image(&self, image: InlineData, prompt: &str) -> Result<GeneratedMedia> {
        self.client.edit_image(IMAGE_EDIT_MODEL, image, prompt).await
    }

    /// Speak a line of encouragement.
    pub async fn encouragement_audio(&self, text: &str) -> Result<GeneratedMedia> {
        let line = format!("Say with a clear and encouraging tone: {text}");
        self.client
            .synthesize_speech(TTS_MODEL, &line, TTS_VOICE)
            .await
    }

    /// Generate a motivational video, optionally animating a reference image.
    pub async fn motivation_video(
        &self,
        prompt: &str,
        aspect_ratio: &str,
        reference_image: Option<InlineData>,
    ) -> Result<Vec<u8>> {
        let mut request = VideoRequest::new(prompt, aspect_ratio);
        if let Some(image) = reference_image {
            request = request.with_reference_image(image);
        }
        self.client.generate_video(VIDEO_MODEL, &request).await
    }

    /// Answer a question grounded in web search, with citations.
    pub async fn grounded_answer(&self, question: &str) -> Result<GroundedAnswer> {
        let mut request = GenerateRequest::prompt(question);
        request.grounding = Some(Grounding::Search);
        let response = self.client.generate_content(CHAT_MODEL, &request).await?;
        Ok(GroundedAnswer {
            text: response.text,
            citations: response.citations,
        })
    }

    /// Answer a location question grounded in maps data.
    pub async fn nearby_answer(
        &self,
        question: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<GroundedAnswer> {
        let mut request = GenerateRequest::prompt(question);
        request.grounding = Some(Grounding::Maps {
            latitude,
            longitude,
        });
        let response = self.client.generate_content(CHAT_MODEL, &request).await?;
        Ok(GroundedAnswer {
            text: response.text,
            citations: response.citations,
        })
    }

    /// Start a text chat with the coach persona.
    pub fn chat(&self) -> CoachChat {
        CoachChat::new(self.client.clone(), CHAT_MODEL, CHAT_SYSTEM_INSTRUCTION)
    }

    /// Configuration for a live voice session with the coach persona.
    #[cfg(feature = "live")]
    pub fn live_config(&self) -> crate::live::LiveConfig {
        crate::live::LiveConfig::coach(self.client.api_key())
    }
}

/// Parse a meal analysis reply, tolerating a markdown code fence around the
/// JSON body.
fn parse_meal_analysis(text: &str) -> Result<MealAnalysis> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).map_err(StrydeError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const REPLY: &str = r#"{"dishName":"Oatmeal","calories":350,"protein":12,"carbs":60,"fat":6,"description":"A bowl of oatmeal with berries."}"#;

    #[test]
    fn meal_analysis_parses_bare_json() {
        let analysis = parse_meal_analysis(REPLY).unwrap();
        assert_eq!(analysis.dish_name, "Oatmeal");
        assert_eq!(analysis.calories, 350.0);
    }

    #[test]
    fn meal_analysis_parses_code_fenced_json() {
        let fenced = format!("```json\n{REPLY}\n```");
        let analysis = parse_meal_analysis(&fenced).unwrap();
        assert_eq!(analysis.dish_name, "Oatmeal");

        let plain_fence = format!("```\n{REPLY}\n```");
        let analysis = parse_meal_analysis(&plain_fence).unwrap();
        assert_eq!(analysis.protein, 12.0);
    }

    #[test]
    fn meal_analysis_rejects_non_json() {
        assert!(matches!(
            parse_meal_analysis("I couldn't tell what this is."),
            Err(StrydeError::Serialization(_))
        ));
    }
}
