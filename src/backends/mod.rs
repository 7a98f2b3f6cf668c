//! Concrete prediction backends and the assembly of both fallback chains.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BackendsConfig;
use crate::detection::{self, DetectionResult, LabelScore, LeafImage, ScoreKind, DISEASE_LABELS};
use crate::dispatch::{self, Backend, BackendOutcome, ChatChain, DetectionChain};
use crate::error::BackendError;

pub mod gemini;
pub mod preprocess;
#[cfg(feature = "tensorflow")]
pub mod tensorflow;
pub mod text_generation;
pub mod zero_shot;

pub use gemini::{GeminiChat, GeminiClient, GeminiDetector};
pub use text_generation::TextGenerator;
pub use zero_shot::HttpZeroShotScorer;

/// Scores an image against a set of text labels.
#[async_trait]
pub trait LabelScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score_kind(&self) -> ScoreKind;

    async fn score(&self, image: &LeafImage, labels: &[&str]) -> Result<Vec<LabelScore>, BackendError>;
}

/// Local zero-shot detection: score every known label and keep the best.
pub struct LocalClassifier<S> {
    scorer: S,
}

impl<S: LabelScorer> LocalClassifier<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl<S: LabelScorer> Backend<LeafImage, DetectionResult> for LocalClassifier<S> {
    fn name(&self) -> &'static str {
        self.scorer.name()
    }

    async fn invoke(&self, image: &LeafImage) -> BackendOutcome<DetectionResult> {
        self.scorer
            .score(image, &DISEASE_LABELS)
            .await
            .map(|scores| detection::classify(&scores, self.scorer.score_kind()))
            .into()
    }
}

pub fn build_http_client(timeout: Option<Duration>) -> Result<reqwest::Client, BackendError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Cloud first, then the local classifier.
pub fn detection_chain(config: &BackendsConfig, http: &reqwest::Client) -> Result<DetectionChain, BackendError> {
    let mut chain = dispatch::detection_chain();

    if let Some(key) = config.cloud.active_key() {
        let client = Arc::new(GeminiClient::new(
            http.clone(),
            &config.cloud.base_url,
            &config.cloud.model,
            key,
        ));
        chain = chain.with_backend(Box::new(GeminiDetector::new(client)));
    }

    // One local classifier slot: a scoring server wins over the in-process graph.
    if let Some(url) = &config.local_classifier_url {
        let scorer = HttpZeroShotScorer::new(http.clone(), url);
        chain = chain.with_backend(Box::new(LocalClassifier::new(scorer)));
    }

    #[cfg(feature = "tensorflow")]
    if let (None, Some(tf)) = (&config.local_classifier_url, &config.tensorflow) {
        let scorer = tensorflow::TfScorer::load(&tf.model_path, &tf.labels_path)?;
        chain = chain.with_backend(Box::new(LocalClassifier::new(scorer)));
    }

    log_chain("detection", &chain.backend_names());
    Ok(chain)
}

/// Cloud first, then the local text generator.
pub fn chat_chain(config: &BackendsConfig, http: &reqwest::Client) -> ChatChain {
    let mut chain = dispatch::chat_chain();

    if let Some(key) = config.cloud.active_key() {
        let client = Arc::new(GeminiClient::new(
            http.clone(),
            &config.cloud.base_url,
            &config.cloud.model,
            key,
        ));
        chain = chain.with_backend(Box::new(GeminiChat::new(client)));
    }

    if let Some(url) = &config.local_textgen_url {
        chain = chain.with_backend(Box::new(TextGenerator::new(http.clone(), url)));
    }

    log_chain("chat", &chain.backend_names());
    chain
}

fn log_chain(kind: &str, names: &[&str]) {
    if names.is_empty() {
        tracing::warn!("No {} backends configured, only the built-in fallback will answer", kind);
    } else {
        tracing::info!("{} chain: {}", kind, names.join(" -> "));
    }
}
