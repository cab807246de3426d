//! Prediction results and the records kept about them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ranked label with its softmax probability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    /// Probability in `[0, 1]`.
    pub confidence: f32,
}

/// Top-K predictions, highest confidence first, ties ordered by ascending
/// class index. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<Prediction>", try_from = "Vec<Prediction>")]
pub struct PredictionResult(Vec<Prediction>);

impl TryFrom<Vec<Prediction>> for PredictionResult {
    type Error = &'static str;

    fn try_from(predictions: Vec<Prediction>) -> Result<Self, Self::Error> {
        Self::new(predictions).ok_or("prediction result must not be empty")
    }
}

impl From<PredictionResult> for Vec<Prediction> {
    fn from(result: PredictionResult) -> Self {
        result.0
    }
}

impl PredictionResult {
    /// Wrap already-ranked predictions. Returns `None` when empty.
    pub fn new(predictions: Vec<Prediction>) -> Option<Self> {
        if predictions.is_empty() {
            return None;
        }
        Some(Self(predictions))
    }

    /// Highest-confidence prediction.
    pub fn top(&self) -> &Prediction {
        &self.0[0]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Prediction> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Prediction] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Prediction> {
        self.0
    }
}

impl<'a> IntoIterator for &'a PredictionResult {
    type Item = &'a Prediction;
    type IntoIter = std::slice::Iter<'a, Prediction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One completed classification, as kept by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub timestamp: DateTime<Utc>,
    pub filename: Option<String>,
    pub top: Prediction,
    pub predictions: Vec<Prediction>,
}

impl LedgerEntry {
    pub fn new(filename: Option<String>, result: &PredictionResult) -> Self {
        Self::at(Utc::now(), filename, result)
    }

    pub fn at(timestamp: DateTime<Utc>, filename: Option<String>, result: &PredictionResult) -> Self {
        Self {
            timestamp,
            filename,
            top: result.top().clone(),
            predictions: result.as_slice().to_vec(),
        }
    }
}

/// Which weight set the engine ended up serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    /// Task-specific weights found at the well-known fine-tuned path.
    FineTuned,
    /// Generic pretrained weights.
    Pretrained,
}

impl WeightSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FineTuned => "fine_tuned",
            Self::Pretrained => "pretrained",
        }
    }
}

/// Description of the loaded model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub weights: WeightSource,
    pub num_classes: usize,
    /// `[batch, channels, height, width]`.
    pub input_shape: [usize; 4],
}

/// Liveness report. Never runs inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub model_loaded: bool,
    pub weights: Option<WeightSource>,
    pub device: String,
}
