//! Core types, error taxonomy, configuration, and the prediction ledger.

pub mod config;
pub mod error;
pub mod ledger;
pub mod prediction;
pub mod schema;
pub mod tensor;

pub use config::{ClassifierConfig, PreprocessConfig};
pub use error::{ClassifyError, ConfigError, ErrorKind};
pub use ledger::Ledger;
pub use prediction::{Health, LedgerEntry, ModelInfo, Prediction, PredictionResult, WeightSource};
pub use tensor::{NormalizedTensor, RawImage, ScoreVector};
