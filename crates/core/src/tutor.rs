//! AI Orchestration Layer
//!
//! The three operations a learner session needs from the generative AI
//! backend: synthesize the exercise picture, transcribe spoken answers, and
//! grade the description. Image generation and transcription report their
//! failures; grading never does and falls back to a fixed apology result so
//! the learner always reaches the feedback screen.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    error::TutorError,
    feedback::{self, FeedbackResult},
    generative::{GenerateContentRequest, GenerationConfig, GenerativeBackend, InlineData, Part},
    prompts::PromptSet,
};

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TUTOR_MODEL: &str = "gemini-2.5-flash";

/// Used when the backend returns image bytes without a MIME type.
const DEFAULT_IMAGE_MIME_TYPE: &str = "image/png";

/// The operations a session invokes at each transition.
///
/// This abstraction lets the session machine run against any provider, or
/// against a fake in tests.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TutorService: Send + Sync {
    /// Generates the exercise picture for a topic.
    ///
    /// Returns a non-empty payload, or `NoImageGenerated` / `Backend`.
    async fn generate_image(&self, topic_title: &str) -> Result<InlineData, TutorError>;

    /// Transcribes a recorded answer. An empty string is a valid result.
    async fn transcribe_audio(&self, audio: &InlineData) -> Result<String, TutorError>;

    /// Grades a description against the picture. Never fails.
    async fn evaluate_description(
        &self,
        image: &InlineData,
        student_text: &str,
        topic_title: &str,
    ) -> FeedbackResult;
}

/// Which model serves which operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelConfig {
    pub image_model: String,
    pub tutor_model: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            tutor_model: DEFAULT_TUTOR_MODEL.to_string(),
        }
    }
}

/// `TutorService` backed by a `generateContent` API.
pub struct Tutor {
    backend: Arc<dyn GenerativeBackend>,
    models: ModelConfig,
    prompts: PromptSet,
}

impl Tutor {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        models: ModelConfig,
        prompts: PromptSet,
    ) -> Self {
        Self {
            backend,
            models,
            prompts,
        }
    }

    async fn try_evaluate(
        &self,
        image: &InlineData,
        student_text: &str,
        topic_title: &str,
    ) -> Result<FeedbackResult, TutorError> {
        let prompt = self.prompts.evaluation_prompt(topic_title, student_text);
        let request = GenerateContentRequest::single_turn(vec![
            Part::inline(image.clone()),
            Part::text(prompt),
        ])
        .with_config(GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(feedback::response_schema()),
        });

        let response = self
            .backend
            .generate_content(&self.models.tutor_model, request)
            .await?;
        let json_text = response.text().unwrap_or_else(|| "{}".to_string());
        FeedbackResult::from_json(&json_text)
    }
}

#[async_trait]
impl TutorService for Tutor {
    async fn generate_image(&self, topic_title: &str) -> Result<InlineData, TutorError> {
        info!(topic = %topic_title, model = %self.models.image_model, "Generating topic image");
        let prompt = self.prompts.image_prompt(topic_title);
        let request = GenerateContentRequest::single_turn(vec![Part::text(prompt)]);

        let result = match self
            .backend
            .generate_content(&self.models.image_model, request)
            .await
        {
            Ok(response) => response
                .first_inline_data()
                .cloned()
                .ok_or(TutorError::NoImageGenerated),
            Err(e) => Err(e),
        };

        match result {
            Ok(mut image) => {
                if image.mime_type.is_empty() {
                    image.mime_type = DEFAULT_IMAGE_MIME_TYPE.to_string();
                }
                info!(
                    mime_type = %image.mime_type,
                    encoded_len = image.data.len(),
                    "Image generated"
                );
                Ok(image)
            }
            Err(e) => {
                error!(topic = %topic_title, error = %e, "Error generating image");
                Err(e)
            }
        }
    }

    async fn transcribe_audio(&self, audio: &InlineData) -> Result<String, TutorError> {
        info!(mime_type = %audio.mime_type, encoded_len = audio.data.len(), "Transcribing audio");
        let request = GenerateContentRequest::single_turn(vec![
            Part::inline(audio.clone()),
            Part::text(self.prompts.transcription_prompt()),
        ]);

        match self
            .backend
            .generate_content(&self.models.tutor_model, request)
            .await
        {
            Ok(response) => Ok(response.text().unwrap_or_default()),
            Err(e) => {
                error!(error = %e, "Error transcribing audio");
                Err(e)
            }
        }
    }

    async fn evaluate_description(
        &self,
        image: &InlineData,
        student_text: &str,
        topic_title: &str,
    ) -> FeedbackResult {
        info!(topic = %topic_title, chars = student_text.chars().count(), "Evaluating description");
        match self.try_evaluate(image, student_text, topic_title).await {
            Ok(result) => {
                info!(score = result.score, "Description evaluated");
                result
            }
            Err(e) => {
                error!(error = %e, "Error evaluating description, returning fallback feedback");
                FeedbackResult::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generative::{GenerateContentResponse, MockGenerativeBackend};
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    fn text_response(text: &str) -> GenerateContentResponse {
        response(json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}))
    }

    fn tutor(backend: MockGenerativeBackend) -> Tutor {
        Tutor::new(Arc::new(backend), ModelConfig::default(), PromptSet::default())
    }

    fn picture() -> InlineData {
        InlineData::new("image/png", "iVBORw0KGgo=")
    }

    const VALID_FEEDBACK: &str = r#"{
        "grammarCorrections": [{"error": "es grande", "correction": "es numerosa", "explanation": "Registro más preciso."}],
        "vocabularySuggestions": ["numerosa"],
        "coherenceCheck": "Coincide con la imagen.",
        "score": 7,
        "scoreBreakdown": {"grammar": 8, "vocabulary": 6, "coherence": 7},
        "generalAdvice": "Sigue así."
    }"#;

    #[tokio::test]
    async fn test_generate_image_returns_first_image_part() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .withf(|model, request| {
                model.to_string() == DEFAULT_IMAGE_MODEL
                    && request.generation_config.is_none()
                    && request.contents[0].parts.len() == 1
                    && request.contents[0].parts[0]
                        .text
                        .as_deref()
                        .is_some_and(|t| t.contains("\"La familia\""))
            })
            .times(1)
            .returning(|_, _| {
                Ok(response(json!({"candidates": [{"content": {"parts": [
                    {"text": "Aquí tienes la imagen"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                ]}}]})))
            });

        let image = tutor(backend).generate_image("La familia").await.unwrap();
        assert_eq!(image, picture());
    }

    #[tokio::test]
    async fn test_generate_image_without_image_part_fails() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Ok(text_response("Lo siento, no puedo generar imágenes.")));

        let err = tutor(backend).generate_image("La familia").await.unwrap_err();
        assert!(matches!(err, TutorError::NoImageGenerated));
    }

    #[tokio::test]
    async fn test_generate_image_ignores_empty_payloads() {
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_content().returning(|_, _| {
            Ok(response(json!({"candidates": [{"content": {"parts": [
                {"inlineData": {"mimeType": "image/png", "data": ""}}
            ]}}]})))
        });

        let err = tutor(backend).generate_image("La ciudad").await.unwrap_err();
        assert!(matches!(err, TutorError::NoImageGenerated));
    }

    #[tokio::test]
    async fn test_generate_image_defaults_missing_mime_type() {
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_content().returning(|_, _| {
            Ok(response(json!({"candidates": [{"content": {"parts": [
                {"inlineData": {"data": "iVBORw0KGgo="}}
            ]}}]})))
        });

        let image = tutor(backend).generate_image("La ciudad").await.unwrap();
        assert_eq!(image.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_generate_image_propagates_backend_error() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Err(TutorError::Backend("503 Service Unavailable".to_string())));

        let err = tutor(backend).generate_image("La familia").await.unwrap_err();
        assert!(matches!(err, TutorError::Backend(msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_transcribe_sends_audio_before_instruction() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .withf(|model, request| {
                let parts = &request.contents[0].parts;
                model.to_string() == DEFAULT_TUTOR_MODEL
                    && parts.len() == 2
                    && parts[0].inline_data.as_ref().is_some_and(|d| d.mime_type == "audio/webm")
                    && parts[1].text.as_deref().is_some_and(|t| t.contains("muletillas"))
            })
            .times(1)
            .returning(|_, _| Ok(text_response("Eh... mi familia es grande")));

        let text = tutor(backend)
            .transcribe_audio(&InlineData::new("audio/webm", "GkXfow=="))
            .await
            .unwrap();
        assert_eq!(text, "Eh... mi familia es grande");
    }

    #[tokio::test]
    async fn test_transcribe_without_text_is_empty_string() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Ok(response(json!({"candidates": []}))));

        let text = tutor(backend)
            .transcribe_audio(&InlineData::new("audio/webm", "GkXfow=="))
            .await
            .unwrap();
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn test_transcribe_propagates_backend_error() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Err(TutorError::Backend("connection reset".to_string())));

        let result = tutor(backend)
            .transcribe_audio(&InlineData::new("audio/webm", "GkXfow=="))
            .await;
        assert!(matches!(result, Err(TutorError::Backend(_))));
    }

    #[tokio::test]
    async fn test_evaluate_sends_image_prompt_and_schema() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .withf(|model, request| {
                let parts = &request.contents[0].parts;
                let config = request.generation_config.as_ref();
                model.to_string() == DEFAULT_TUTOR_MODEL
                    && parts[0].inline_data.as_ref() == Some(&picture())
                    && parts[1].text.as_deref().is_some_and(|t| {
                        t.contains("\"Mi familia es grande\"") && t.contains("\"La familia\"")
                    })
                    && config.and_then(|c| c.response_mime_type.as_deref())
                        == Some("application/json")
                    && config.and_then(|c| c.response_schema.clone())
                        == Some(feedback::response_schema())
            })
            .times(1)
            .returning(|_, _| Ok(text_response(VALID_FEEDBACK)));

        let result = tutor(backend)
            .evaluate_description(&picture(), "Mi familia es grande", "La familia")
            .await;
        assert_eq!(result.score, 7.0);
        assert_eq!(result.score_breakdown.grammar, 8.0);
        assert_eq!(result.grammar_corrections[0].correction, "es numerosa");
    }

    #[tokio::test]
    async fn test_evaluate_backend_failure_returns_fallback() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Err(TutorError::Backend("quota exceeded".to_string())));

        let result = tutor(backend)
            .evaluate_description(&picture(), "Mi familia es grande", "La familia")
            .await;
        assert_eq!(result, FeedbackResult::fallback());
    }

    #[tokio::test]
    async fn test_evaluate_truncated_json_returns_fallback() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Ok(text_response(r#"{"grammarCorrections": [{"error": "Mi"#)));

        let result = tutor(backend)
            .evaluate_description(&picture(), "Mi familia es grande", "La familia")
            .await;
        assert_eq!(result, FeedbackResult::fallback());
    }

    #[tokio::test]
    async fn test_evaluate_missing_text_returns_fallback() {
        let mut backend = MockGenerativeBackend::new();
        backend
            .expect_generate_content()
            .returning(|_, _| Ok(response(json!({"candidates": [{"content": {"parts": []}}]}))));

        let result = tutor(backend)
            .evaluate_description(&picture(), "Mi familia es grande", "La familia")
            .await;
        assert_eq!(result, FeedbackResult::fallback());
    }

    #[tokio::test]
    async fn test_evaluate_out_of_range_score_returns_fallback() {
        let mut backend = MockGenerativeBackend::new();
        backend.expect_generate_content().returning(|_, _| {
            Ok(text_response(&VALID_FEEDBACK.replace("\"score\": 7", "\"score\": 70")))
        });

        let result = tutor(backend)
            .evaluate_description(&picture(), "Mi familia es grande", "La familia")
            .await;
        assert_eq!(result, FeedbackResult::fallback());
    }
}
