/// Failures of the AI orchestration layer.
#[derive(Debug, thiserror::Error)]
pub enum TutorError {
    /// The AI service call failed: network, authentication, quota or an
    /// undecodable response body.
    #[error("AI backend request failed: {0}")]
    Backend(String),
    /// The backend answered but no part carried image data.
    #[error("No image generated.")]
    NoImageGenerated,
    /// The evaluation response was not valid JSON or violated the schema.
    #[error("Malformed evaluation response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for TutorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<serde_json::Error> for TutorError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}
