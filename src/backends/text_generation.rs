//! Local text generation through an inference server's `/generate` route.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::chat;
use crate::dispatch::{Backend, BackendOutcome};
use crate::error::BackendError;

pub const MAX_NEW_TOKENS: u32 = 150;
pub const TEMPERATURE: f32 = 0.7;

pub struct TextGenerator {
    http: reqwest::Client,
    endpoint: String,
}

/// Servers answer either with a single object or a one-element list.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Single(Generated),
    Batch(Vec<Generated>),
}

#[derive(Deserialize)]
struct Generated {
    generated_text: String,
}

impl TextGenerator {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/generate", base_url.trim_end_matches('/')),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<Option<String>, BackendError> {
        let body = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": MAX_NEW_TOKENS,
                "do_sample": true,
                "temperature": TEMPERATURE
            }
        });

        let response = self.http.post(&self.endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::status(status.as_u16(), &body));
        }

        let text = match response.json::<GenerateResponse>().await? {
            GenerateResponse::Single(g) => Some(g.generated_text),
            GenerateResponse::Batch(batch) => batch.into_iter().next().map(|g| g.generated_text),
        };

        Ok(text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl Backend<str, String> for TextGenerator {
    fn name(&self) -> &'static str {
        "text-generation"
    }

    async fn invoke(&self, query: &str) -> BackendOutcome<String> {
        self.generate(&chat::local_prompt(query)).await.into()
    }
}
