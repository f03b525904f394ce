// src/oracle/client.rs
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::oracle::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, InlineData, Part,
};
use crate::utils::error::{AppError, OracleError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
// Keep a polite gap between calls; the pipeline is strictly sequential
// so this also paces the whole run.
const REQUEST_DELAY_MS: u64 = 150;

/// Payload handed to the extraction oracle alongside a prompt.
#[derive(Debug, Clone)]
pub enum OraclePayload {
    /// Rasterized page bytes (PNG).
    Image { data: Vec<u8>, mime_type: String },
    /// A text document, e.g. a JSON rendering of the span mapping.
    Text { data: String, mime_type: String },
}

impl OraclePayload {
    pub fn png(data: Vec<u8>) -> Self {
        Self::Image {
            data,
            mime_type: "image/png".to_string(),
        }
    }

    pub fn json_text(data: String) -> Self {
        Self::Text {
            data,
            mime_type: "application/json".to_string(),
        }
    }
}

/// External multimodal extraction service, treated as a pure function:
/// payload + prompt -> JSON value or failure.
///
/// Injected into every consumer so tests can substitute a scripted fake.
pub trait SectionOracle {
    fn extract_json(
        &self,
        payload: &OraclePayload,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, OracleError>>;
}

/// Gemini-backed implementation of [`SectionOracle`].
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Builds a client from the environment. A missing API key is a
    /// configuration error and aborts the run before any work begins.
    pub fn from_env() -> Result<Self, AppError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| AppError::Config("GEMINI_API_KEY environment variable not set".into()))?;
        let model =
            std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            model,
            base_url,
            http,
        })
    }

    fn build_request(&self, payload: &OraclePayload, prompt: &str) -> GenerateContentRequest {
        // File part first, then the instruction, matching how the
        // prompts are phrased ("from the file").
        let payload_part = match payload {
            OraclePayload::Image { data, mime_type } => Part::InlineData(InlineData {
                mime_type: mime_type.clone(),
                data: BASE64.encode(data),
            }),
            OraclePayload::Text { data, mime_type } => Part::InlineData(InlineData {
                mime_type: mime_type.clone(),
                data: BASE64.encode(data.as_bytes()),
            }),
        };

        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![payload_part, Part::Text(prompt.to_string())],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

impl SectionOracle for GeminiClient {
    async fn extract_json(
        &self,
        payload: &OraclePayload,
        prompt: &str,
    ) -> Result<serde_json::Value, OracleError> {
        tokio::time::sleep(Duration::from_millis(REQUEST_DELAY_MS)).await;

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );
        tracing::debug!("Invoking oracle model {} at {}", self.model, url);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.build_request(payload, prompt))
            .send()
            .await?; // Propagates reqwest::Error as OracleError::Network

        let status = response.status();
        if !status.is_success() {
            tracing::error!("Oracle HTTP error status: {}", status);
            return Err(OracleError::Http(status));
        }

        let body: GenerateContentResponse = response.json().await?;
        let text = body.first_text().ok_or(OracleError::EmptyResponse)?;

        serde_json::from_str(text).map_err(|e| {
            tracing::error!("Failed to decode JSON oracle reply: {}", e);
            OracleError::MalformedJson(e.to_string())
        })
    }
}
