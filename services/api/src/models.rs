//! API Models
//!
//! Request payloads and response views of the HTTP API, annotated with
//! `utoipa` for the OpenAPI document. Views are built from core types and
//! use camelCase like the feedback the examiner model returns.

use describe_core::{
    feedback::FeedbackResult,
    session::{Phase, PhaseKind, Session},
    topic::Topic,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct TopicView {
    #[schema(example = "familia")]
    pub id: String,
    #[schema(example = "La familia")]
    pub title: String,
    pub description: String,
    pub icon: String,
    pub vocabulary: Vec<String>,
}

impl From<&Topic> for TopicView {
    fn from(topic: &Topic) -> Self {
        Self {
            id: topic.id.clone(),
            title: topic.title.clone(),
            description: topic.description.clone(),
            icon: topic.icon.clone(),
            vocabulary: topic.vocabulary.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    #[schema(example = "image/png")]
    pub mime_type: String,
    /// Base64 encoded image bytes.
    pub data: String,
}

/// Everything the presentation layer needs to render the current phase.
#[derive(Serialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, example = "Describing")]
    pub phase: PhaseKind,
    pub topic: Option<TopicView>,
    pub image: Option<ImageView>,
    /// Latest transcript while describing.
    pub draft: Option<String>,
    pub transcribing: bool,
    /// The submitted description, once analysis has begun.
    pub text: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub feedback: Option<FeedbackResult>,
    pub last_error: Option<String>,
}

impl SessionView {
    pub fn new(id: Uuid, session: &Session) -> Self {
        let (draft, transcribing, text) = match session.phase() {
            Phase::Describing {
                draft,
                transcribing,
                ..
            } => (draft.clone(), *transcribing, None),
            Phase::Analyzing { text, .. } | Phase::Feedback { text, .. } => {
                (None, false, Some(text.clone()))
            }
            Phase::TopicSelection | Phase::GeneratingImage { .. } => (None, false, None),
        };
        Self {
            id,
            phase: session.phase().kind(),
            topic: session.topic().map(TopicView::from),
            image: session.image().map(|image| ImageView {
                mime_type: image.mime_type.clone(),
                data: image.data.clone(),
            }),
            draft,
            transcribing,
            text,
            feedback: session.feedback().cloned(),
            last_error: session.last_error().map(str::to_string),
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SelectTopicPayload {
    #[schema(example = "familia")]
    pub topic_id: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct SubmitTextPayload {
    #[schema(example = "Mi familia es grande")]
    pub text: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use describe_core::{generative::InlineData, topic::TopicCatalog};

    fn familia() -> Topic {
        TopicCatalog::default().find("familia").unwrap().clone()
    }

    #[test]
    fn test_fresh_session_view() {
        let id = Uuid::new_v4();
        let view = SessionView::new(id, &Session::new());

        assert_eq!(view.id, id);
        assert_eq!(view.phase, PhaseKind::TopicSelection);
        assert!(view.topic.is_none());
        assert!(view.image.is_none());
        assert!(view.feedback.is_none());
        assert!(!view.transcribing);
    }

    #[test]
    fn test_feedback_session_view() {
        let mut session = Session::new();
        session.begin_image_generation(familia()).unwrap();
        session
            .finish_image_generation(Ok(InlineData::new("image/png", "iVBORw0KGgo=")))
            .unwrap();
        session.begin_analysis("Mi familia es grande").unwrap();
        session.finish_analysis(FeedbackResult::fallback()).unwrap();

        let view = SessionView::new(Uuid::new_v4(), &session);
        assert_eq!(view.phase, PhaseKind::Feedback);
        assert_eq!(view.topic.unwrap().title, "La familia");
        assert_eq!(view.image.unwrap().mime_type, "image/png");
        assert_eq!(view.text.as_deref(), Some("Mi familia es grande"));
        assert_eq!(view.feedback, Some(FeedbackResult::fallback()));
        assert!(view.draft.is_none());
    }

    #[test]
    fn test_session_view_serializes_camel_case() {
        let json = serde_json::to_value(SessionView::new(Uuid::nil(), &Session::new())).unwrap();
        assert_eq!(json["phase"], "TopicSelection");
        assert!(json.get("lastError").is_some());
        assert!(json.get("last_error").is_none());
    }

    #[test]
    fn test_select_topic_payload_deserialization() {
        let payload: SelectTopicPayload =
            serde_json::from_str(r#"{"topicId": "familia"}"#).unwrap();
        assert_eq!(payload.topic_id, "familia");

        let result: Result<SelectTopicPayload, _> = serde_json::from_str(r#"{}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Session not found".to_string(),
        };

        let json = serde_json::to_string(&error).unwrap();
        let expected = r#"{"message":"Session not found"}"#;
        assert_eq!(json, expected);
    }
}
