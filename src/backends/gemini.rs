//! Google Gemini `generateContent` backend for both detection and chat.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::chat;
use crate::detection::{DetectionResult, LeafImage};
use crate::dispatch::{Backend, BackendOutcome};
use crate::error::BackendError;

const DETECTION_PROMPT: &str = r#"
Analyze this plant image for diseases.
Return a JSON object with this exact structure:
{
    "disease": "Name of the disease or 'Healthy'",
    "confidence": 95,
    "treatments": ["Step 1", "Step 2", "Step 3"]
}
If it's not a plant, set disease to "Not a plant".
"#;

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model),
            api_key: api_key.to_string(),
        }
    }

    /// Sends a request body and returns the text of the first candidate, or
    /// `None` if the model produced no text.
    pub async fn generate(&self, body: &Value) -> Result<Option<String>, BackendError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::status(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}

pub struct GeminiDetector {
    client: Arc<GeminiClient>,
}

impl GeminiDetector {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Backend<LeafImage, DetectionResult> for GeminiDetector {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn invoke(&self, image: &LeafImage) -> BackendOutcome<DetectionResult> {
        tracing::debug!("Using Gemini for detection of {}", image.path.display());
        let (mime_type, data) = match inline_image(image) {
            Ok(inline) => inline,
            Err(err) => return BackendOutcome::Failed(err),
        };

        let body = json!({
            "contents": [{
                "parts": [
                    { "text": DETECTION_PROMPT },
                    { "inline_data": { "mime_type": mime_type, "data": data } }
                ]
            }],
            "generationConfig": {
                "temperature": 0.4,
                "topP": 1,
                "topK": 32,
                "maxOutputTokens": 1024,
                "responseMimeType": "application/json"
            }
        });

        match self.client.generate(&body).await {
            Ok(Some(text)) => parse_detection(&text).map(Some).into(),
            Ok(None) => BackendOutcome::Empty,
            Err(err) => BackendOutcome::Failed(err),
        }
    }
}

pub struct GeminiChat {
    client: Arc<GeminiClient>,
}

impl GeminiChat {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Backend<str, String> for GeminiChat {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn invoke(&self, query: &str) -> BackendOutcome<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": chat::cloud_prompt(query) }] }]
        });
        self.client.generate(&body).await.into()
    }
}

/// Parses the model's JSON answer, tolerating a markdown code fence.
pub fn parse_detection(text: &str) -> Result<DetectionResult, BackendError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let mut result: DetectionResult = serde_json::from_str(unfenced.trim())?;
    if result.disease.trim().is_empty() {
        return Err(BackendError::Malformed("empty disease name".into()));
    }
    result.confidence = result.confidence.clamp(0.0, 100.0);
    Ok(result)
}

/// MIME type and base64 payload for an upload. Formats the API does not take
/// directly are re-encoded as PNG.
fn inline_image(image: &LeafImage) -> Result<(&'static str, String), BackendError> {
    let format = image::guess_format(&image.data)
        .map_err(|err| BackendError::InvalidImage(err.to_string()))?;

    let mime_type = match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    };

    if let Some(mime_type) = mime_type {
        return Ok((mime_type, general_purpose::STANDARD.encode(&image.data)));
    }

    let decoded = image::load_from_memory(&image.data)
        .map_err(|err| BackendError::InvalidImage(err.to_string()))?;
    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .map_err(|err| BackendError::InvalidImage(err.to_string()))?;
    Ok(("image/png", general_purpose::STANDARD.encode(&png)))
}
