use std::sync::Arc;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::media::{strip_format_header, EncodedImage};

pub const RESULT_MEDIA_TYPE: &str = "image/jpeg";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("The model declined to generate an image. It might have violated safety policies.")]
    ProviderRefused(String),
    #[error("No image generated.")]
    NoResult,
    #[error("{0}")]
    TransportFailure(String),
}

impl TransformError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderRefused(_) => "provider_refused",
            Self::NoResult => "no_result",
            Self::TransportFailure(_) => "transport_failure",
        }
    }

    /// Message stored on a failed slot. Refusals keep the provider's own text.
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderRefused(text) if !text.trim().is_empty() => {
                format!("{self} Model response: {}", text.trim())
            }
            _ => self.to_string(),
        }
    }

    /// Provider text or transport description, when the variant carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::ProviderRefused(text) | Self::TransportFailure(text) => Some(text.as_str()),
            Self::NoResult => None,
        }
    }
}

/// The remote generation capability: one source image and one prompt in,
/// one generated image out.
pub trait TransformClient: Send + Sync + 'static {
    fn transform(&self, image: &EncodedImage, prompt: &str)
        -> Result<EncodedImage, TransformError>;
}

pub type SharedTransformClient = Arc<dyn TransformClient>;

#[derive(Debug, Clone)]
pub struct GeminiTransformClient {
    settings: ProviderSettings,
}

impl GeminiTransformClient {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.endpoint.as_str().trim_end_matches('/'),
            self.settings.model
        )
    }
}

impl TransformClient for GeminiTransformClient {
    fn transform(
        &self,
        image: &EncodedImage,
        prompt: &str,
    ) -> Result<EncodedImage, TransformError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                TransformError::TransportFailure(String::from(
                    "Missing GEMINI_API_KEY in environment or .env",
                ))
            })?;

        let client = Client::builder()
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|e| TransformError::TransportFailure(format!("http client init failed: {e}")))?;
        let resp = client
            .post(self.generate_content_url())
            .header("x-goog-api-key", api_key)
            .json(&build_request_body(image, prompt))
            .send()
            .map_err(|e| TransformError::TransportFailure(format!("Gemini request failed: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(TransformError::TransportFailure(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        let payload: GenerateContentResponse = resp.json().map_err(|e| {
            TransformError::TransportFailure(format!("Gemini JSON decode failed: {e}"))
        })?;
        interpret_response(payload)
    }
}

pub fn build_request_body(image: &EncodedImage, prompt: &str) -> Value {
    let payload = strip_format_header(image.as_data_url());
    let mime_type = image.media_type();
    json!({
        "contents": [{
            "parts": [
                { "text": prompt },
                { "inlineData": { "mimeType": mime_type, "data": payload } }
            ]
        }]
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InlineData {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

pub fn interpret_response(payload: GenerateContentResponse) -> Result<EncodedImage, TransformError> {
    let parts = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts)
        .unwrap_or_default();

    if let Some(data) = parts
        .iter()
        .filter_map(|part| part.inline_data.as_ref())
        .filter_map(|inline| inline.data.as_deref())
        .find(|data| !data.is_empty())
    {
        return Ok(EncodedImage::from_parts(RESULT_MEDIA_TYPE, data));
    }

    if let Some(text) = parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .find(|text| !text.trim().is_empty())
    {
        debug!(text = %text, "model returned text instead of image");
        return Err(TransformError::ProviderRefused(text.to_string()));
    }

    if let Some(reason) = payload
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
        .filter(|reason| !reason.trim().is_empty())
    {
        debug!(block_reason = %reason, "prompt blocked by provider");
        return Err(TransformError::ProviderRefused(reason));
    }

    Err(TransformError::NoResult)
}
