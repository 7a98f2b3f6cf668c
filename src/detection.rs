//! Disease detection types, the zero-shot label set and its remediation table.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Candidate labels for zero-shot classification. Index order matters to
/// scorers that return bare score vectors.
pub const DISEASE_LABELS: [&str; 15] = [
    "healthy plant",
    "apple scab",
    "apple black rot",
    "grape black rot",
    "grape esca",
    "corn northern leaf blight",
    "corn common rust",
    "tomato late blight",
    "tomato early blight",
    "tomato bacterial spot",
    "potato late blight",
    "potato early blight",
    "pepper bacterial spot",
    "rice bacterial leaf blight",
    "rice brown spot",
];

const HEALTHY_TREATMENTS: &[&str] = &[
    "Continue current care practices",
    "Monitor regularly for any changes",
];

const TOMATO_LATE_BLIGHT_TREATMENTS: &[&str] = &[
    "Remove affected leaves immediately",
    "Apply copper-based fungicide",
    "Improve air circulation",
];

const DEFAULT_TREATMENTS: &[&str] = &[
    "Isolate affected plant",
    "Consult local agricultural extension",
    "Ensure proper watering and nutrition",
];

const UNAVAILABLE_TREATMENTS: &[&str] = &[
    "Could not run AI models.",
    "Please configure GEMINI_API_KEY AND/OR a local classifier (LOCAL_CLASSIFIER_URL).",
    "Check .env file for GEMINI_API_KEY.",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub disease: String,
    /// Percentage in `0..=100`.
    pub confidence: f64,
    pub treatments: Vec<String>,
}

impl DetectionResult {
    /// Fixed answer when no backend produced a diagnosis.
    pub fn unavailable() -> Self {
        Self {
            disease: "System Logic Error".to_string(),
            confidence: 0.0,
            treatments: to_owned_list(UNAVAILABLE_TREATMENTS),
        }
    }
}

/// An uploaded leaf photo, already persisted to the upload directory.
#[derive(Debug, Clone)]
pub struct LeafImage {
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl LeafImage {
    pub fn new(path: impl AsRef<Path>, data: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            data,
            content_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

pub fn label_prompt(label: &str) -> String {
    format!("a photo of a plant with {}", label)
}

/// Remediation steps for a label, or the generic list when it has no entry.
pub fn treatments_for(label: &str) -> Vec<String> {
    let steps = match label {
        "healthy plant" => HEALTHY_TREATMENTS,
        "tomato late blight" => TOMATO_LATE_BLIGHT_TREATMENTS,
        _ => DEFAULT_TREATMENTS,
    };
    to_owned_list(steps)
}

/// What a scorer's numbers mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Raw similarities over the full label set; softmax gives probabilities.
    Logits,
    /// Already softmaxed by the model. Partial lists keep their values.
    Probabilities,
}

/// Picks the highest-scoring label and reports its probability as a percentage.
pub fn classify(scores: &[LabelScore], kind: ScoreKind) -> Option<DetectionResult> {
    let scores: Vec<&LabelScore> = scores.iter().filter(|s| s.score.is_finite()).collect();
    if scores.is_empty() {
        return None;
    }

    let raw: Vec<f32> = scores.iter().map(|s| s.score).collect();
    let probabilities = match kind {
        ScoreKind::Logits => softmax(&raw),
        ScoreKind::Probabilities => raw.iter().map(|p| p.clamp(0.0, 1.0)).collect(),
    };

    let (best, probability) = probabilities
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, &p)| (scores[i], p))?;

    let confidence = (f64::from(probability) * 100.0 * 100.0).round() / 100.0;

    Some(DetectionResult {
        disease: title_case(&best.label),
        confidence,
        treatments: treatments_for(&best.label),
    })
}

fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|e| e / sum).collect()
}

pub fn title_case(label: &str) -> String {
    label
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
