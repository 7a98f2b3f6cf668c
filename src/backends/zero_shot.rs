//! Zero-shot image classification served by a local inference server.
//!
//! Request: `{"inputs": <base64 image>, "parameters": {"candidate_labels": [...]}}`
//! Response: `[{"label": "...", "score": 0.87}, ...]`

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;

use super::LabelScorer;
use crate::detection::{label_prompt, LabelScore, LeafImage, ScoreKind};
use crate::error::BackendError;

pub struct HttpZeroShotScorer {
    http: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct PromptScore {
    label: String,
    score: f32,
}

impl HttpZeroShotScorer {
    pub fn new(http: reqwest::Client, url: &str) -> Self {
        Self {
            http,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl LabelScorer for HttpZeroShotScorer {
    fn name(&self) -> &'static str {
        "zero-shot-http"
    }

    /// The pipeline softmaxes over every candidate before replying.
    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Probabilities
    }

    async fn score(&self, image: &LeafImage, labels: &[&str]) -> Result<Vec<LabelScore>, BackendError> {
        // prompt text -> bare label
        let prompts: HashMap<String, &str> = labels.iter().map(|l| (label_prompt(l), *l)).collect();
        let candidate_labels: Vec<String> = labels.iter().map(|l| label_prompt(l)).collect();

        let body = json!({
            "inputs": general_purpose::STANDARD.encode(&image.data),
            "parameters": { "candidate_labels": candidate_labels }
        });

        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::status(status.as_u16(), &body));
        }

        let scored: Vec<PromptScore> = response.json().await?;
        Ok(scored
            .into_iter()
            .filter_map(|s| {
                let label = prompts.get(&s.label).copied().or_else(|| {
                    labels.iter().copied().find(|l| *l == s.label)
                })?;
                Some(LabelScore {
                    label: label.to_string(),
                    score: s.score,
                })
            })
            .collect())
    }
}
