//! Inference pipeline: image normalization, model execution, top-K ranking.

pub mod engine;
pub mod labels;
pub mod normalizer;
#[cfg(feature = "onnx")]
mod onnx;
pub mod pipeline;
pub mod ranker;

pub use engine::{InferenceEngine, WeightSet};
pub use labels::LabelCatalog;
pub use normalizer::ImageNormalizer;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;
pub use pipeline::{Pipeline, Stage};
pub use ranker::rank;
