//! Gemini REST backend.
//!
//! Sends `generateContent` requests to the Google Generative Language API.
//! The API key travels in the `x-goog-api-key` header and never appears in
//! URLs or logs.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, error};

use crate::{
    error::TutorError,
    generative::{GenerateContentRequest, GenerateContentResponse, GenerativeBackend},
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiConfig {
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

pub struct GeminiConfigBuilder {
    config: GeminiConfig,
}

impl GeminiConfigBuilder {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> GeminiConfig {
        self.config
    }
}

impl GeminiConfig {
    pub fn builder(api_key: SecretString) -> GeminiConfigBuilder {
        GeminiConfigBuilder {
            config: Self {
                base_url: DEFAULT_BASE_URL.to_string(),
                api_key,
                timeout: DEFAULT_TIMEOUT,
            },
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Endpoint for one model's `generateContent` method.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

/// A `GenerativeBackend` talking to Gemini over HTTPS.
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, TutorError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, TutorError> {
        let url = self.config.endpoint(model);
        let parts: usize = request.contents.iter().map(|c| c.parts.len()).sum();
        debug!(%model, parts, "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%model, %status, "generateContent request rejected");
            return Err(TutorError::Backend(format!(
                "{} returned {}: {}",
                model, status, body
            )));
        }

        let body: GenerateContentResponse = response.json().await?;
        debug!(%model, candidates = body.candidates.len(), "Received generateContent response");
        Ok(body)
    }
}
