//! In-process zero-shot scorer backed by a frozen TensorFlow graph.
//!
//! The graph takes a `[1, 224, 224, 3]` float image on `x` and emits one
//! logit per line of the labels file on `Identity`; text embeddings for the
//! label prompts are baked into the graph when it is exported.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

use super::preprocess::{image_to_input, INPUT_SIZE};
use super::LabelScorer;
use crate::detection::{LabelScore, LeafImage, ScoreKind};
use crate::error::BackendError;

fn model_error(err: impl std::fmt::Display) -> BackendError {
    BackendError::Model(err.to_string())
}

struct FrozenGraph {
    session: Session,
    graph: Graph,
    labels: Vec<String>,
}

pub struct TfScorer {
    model: Arc<Mutex<FrozenGraph>>,
}

impl TfScorer {
    pub fn load(model_path: &str, labels_path: &str) -> Result<Self, BackendError> {
        let labels = read_labels(labels_path)?;
        let graph_def = std::fs::read(model_path).map_err(model_error)?;

        let mut graph = Graph::new();
        graph
            .import_graph_def(&graph_def, &ImportGraphDefOptions::new())
            .map_err(model_error)?;
        let session = Session::new(&SessionOptions::new(), &graph).map_err(model_error)?;

        tracing::info!("Loaded frozen graph {} with {} labels", model_path, labels.len());

        Ok(Self {
            model: Arc::new(Mutex::new(FrozenGraph {
                session,
                graph,
                labels,
            })),
        })
    }
}

#[async_trait]
impl LabelScorer for TfScorer {
    fn name(&self) -> &'static str {
        "zero-shot-tensorflow"
    }

    fn score_kind(&self) -> ScoreKind {
        ScoreKind::Logits
    }

    async fn score(&self, image: &LeafImage, labels: &[&str]) -> Result<Vec<LabelScore>, BackendError> {
        let model = self.model.clone();
        let data = image.data.clone();

        let scores = tokio::task::spawn_blocking(move || {
            let model = model
                .lock()
                .map_err(|_| BackendError::Model("model lock poisoned".into()))?;
            model.logits(&data)
        })
        .await
        .map_err(model_error)??;

        Ok(retain_known(scores, labels))
    }
}

impl FrozenGraph {
    fn operation(&self, name: &str) -> Result<tensorflow::Operation, BackendError> {
        self.graph
            .operation_by_name(name)
            .map_err(model_error)?
            .ok_or_else(|| BackendError::Model(format!("operation '{}' not found in graph", name)))
    }

    fn logits(&self, image_data: &[u8]) -> Result<Vec<LabelScore>, BackendError> {
        let side = u64::from(INPUT_SIZE);
        let mut input = Tensor::new(&[1, side, side, 3]);
        input.copy_from_slice(&image_to_input(image_data, INPUT_SIZE)?);

        let input_op = self.operation("x")?;
        let output_op = self.operation("Identity")?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_op, 0, &input);
        let token = args.request_fetch(&output_op, 0);
        self.session.run(&mut args).map_err(model_error)?;
        let output: Tensor<f32> = args.fetch(token).map_err(model_error)?;

        Ok(pair_with_labels(&output, &self.labels))
    }
}

fn read_labels(path: &str) -> Result<Vec<String>, BackendError> {
    Ok(std::fs::read_to_string(path)
        .map_err(model_error)?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn pair_with_labels(logits: &[f32], labels: &[String]) -> Vec<LabelScore> {
    logits
        .iter()
        .zip(labels)
        .map(|(&score, label)| LabelScore {
            label: label.clone(),
            score,
        })
        .collect()
}

/// The graph's label file may carry classes without remediation entries; only
/// the requested labels take part in the softmax.
fn retain_known(scores: Vec<LabelScore>, labels: &[&str]) -> Vec<LabelScore> {
    scores
        .into_iter()
        .filter(|s| labels.contains(&s.label.as_str()))
        .collect()
}
