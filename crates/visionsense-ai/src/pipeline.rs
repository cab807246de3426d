//! Request pipeline: decode → normalize → infer → rank → record.
//!
//! The engine is injected once through [`Pipeline::initialize`]; until then
//! every request fails with [`ClassifyError::ModelUnavailable`]. Stages of a
//! request run in sequence on the caller's thread, and independent requests
//! may share one `Pipeline` across threads.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::{debug, error, field, info, info_span, warn};

use visionsense_core::{
    ClassifierConfig, ClassifyError, ConfigError, ErrorKind, Health, Ledger, LedgerEntry,
    ModelInfo, PredictionResult, RawImage,
};

use crate::engine::InferenceEngine;
use crate::normalizer::{ImageNormalizer, decode};
use crate::ranker::rank;

/// Inference always runs on the host CPU.
pub const DEVICE: &str = "cpu";

/// Where a request is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Decoding,
    Normalizing,
    Inferring,
    Ranking,
    Recording,
    Completed,
    Failed(ErrorKind),
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoding => "decoding",
            Self::Normalizing => "normalizing",
            Self::Inferring => "inferring",
            Self::Ranking => "ranking",
            Self::Recording => "recording",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

pub struct Pipeline {
    engine: OnceLock<Arc<dyn InferenceEngine>>,
    normalizer: ImageNormalizer,
    ledger: Ledger,
    default_top_k: usize,
}

impl Pipeline {
    /// An uninitialized pipeline. Call [`initialize`](Self::initialize) before
    /// classifying. The configuration is validated first.
    pub fn new(config: &ClassifierConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            engine: OnceLock::new(),
            normalizer: ImageNormalizer::new(config.preprocess.clone())?,
            ledger: Ledger::with_capacity(config.ledger_capacity),
            default_top_k: config.top_k,
        })
    }

    /// Install the engine. Weights are fixed for the life of the pipeline, so
    /// only the first call takes effect; returns whether this call did.
    pub fn initialize(&self, engine: Arc<dyn InferenceEngine>) -> bool {
        let available = engine.is_available();
        if self.engine.set(engine).is_err() {
            warn!("pipeline already initialized, keeping the loaded engine");
            return false;
        }
        if available {
            info!("pipeline initialized");
        } else {
            error!("pipeline initialized without a usable model");
        }
        true
    }

    /// Load ONNX weights from `config.model_dir` and install them.
    #[cfg(feature = "onnx")]
    pub fn initialize_from_config(&self, config: &ClassifierConfig) -> bool {
        if self.engine.get().is_some() {
            warn!("pipeline already initialized, skipping weight loading");
            return false;
        }
        self.initialize(Arc::new(crate::onnx::OnnxEngine::from_config(config)))
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    /// Classify one image, returning the `top_k` most probable labels
    /// (the configured default when `None`). Successful results are recorded
    /// in the ledger; failures never are.
    pub fn classify(
        &self,
        raw: &RawImage,
        top_k: Option<usize>,
    ) -> Result<PredictionResult, ClassifyError> {
        let k = top_k.unwrap_or(self.default_top_k);
        let span = info_span!(
            "classify",
            filename = raw.filename.as_deref().unwrap_or("-"),
            top_k = k,
            stage = field::Empty
        );
        let _enter = span.enter();

        let started = Instant::now();
        let mut stage = Stage::Received;
        let outcome = self.run(raw, k, &mut stage);
        let elapsed_us = started.elapsed().as_micros() as u64;
        let terminal = terminal_stage(stage, &outcome);
        span.record("stage", terminal.as_str());

        match &outcome {
            Ok(result) => {
                let top = result.top();
                info!(
                    label = %top.label,
                    confidence = top.confidence,
                    elapsed_us,
                    "classified"
                );
            }
            Err(e) => {
                let kind = e.kind();
                if kind.is_caller_error() {
                    warn!(
                        kind = kind.as_str(),
                        failed_at = stage.as_str(),
                        elapsed_us,
                        "classification rejected: {e}"
                    );
                } else {
                    error!(
                        kind = kind.as_str(),
                        failed_at = stage.as_str(),
                        elapsed_us,
                        "classification failed: {e}"
                    );
                }
            }
        }
        outcome
    }

    fn run(
        &self,
        raw: &RawImage,
        k: usize,
        stage: &mut Stage,
    ) -> Result<PredictionResult, ClassifyError> {
        let engine = self.engine.get().ok_or_else(|| {
            ClassifyError::ModelUnavailable("pipeline not initialized".to_string())
        })?;
        let catalog = engine.catalog().ok_or_else(|| {
            ClassifyError::ModelUnavailable("no weights loaded".to_string())
        })?;
        if k == 0 || k > catalog.len() {
            return Err(ClassifyError::InvalidK {
                k,
                classes: catalog.len(),
            });
        }

        advance(stage, Stage::Decoding);
        let image = decode(raw)?;

        advance(stage, Stage::Normalizing);
        let tensor = self.normalizer.prepare(&image)?;

        advance(stage, Stage::Inferring);
        let scores = engine.infer(&tensor)?;

        advance(stage, Stage::Ranking);
        let result = rank(&scores, k, catalog)?;

        advance(stage, Stage::Recording);
        self.ledger
            .record(LedgerEntry::new(raw.filename.clone(), &result));

        advance(stage, Stage::Completed);
        Ok(result)
    }

    /// Liveness report; never runs inference.
    pub fn health(&self) -> Health {
        let info = self.model_info();
        Health {
            model_loaded: info.is_some(),
            weights: info.map(|i| i.weights),
            device: DEVICE.to_string(),
        }
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.engine.get().and_then(|e| e.model_info())
    }

    /// Up to `limit` recorded predictions, newest first.
    pub fn recent_predictions(&self, limit: usize) -> Vec<LedgerEntry> {
        self.ledger.recent(limit)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }
}

/// Final state of a request: `Completed` when `run` got there, otherwise
/// `Failed` with the error's kind.
fn terminal_stage<T>(reached: Stage, outcome: &Result<T, ClassifyError>) -> Stage {
    match outcome {
        Ok(_) => reached,
        Err(e) => Stage::Failed(e.kind()),
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = stage.as_str(), to = next.as_str(), "stage");
    *stage = next;
}
