//! Inference backend seam and weight-set discovery.

use std::path::{Path, PathBuf};

use visionsense_core::{ClassifyError, ModelInfo, NormalizedTensor, ScoreVector, WeightSource};

use crate::labels::LabelCatalog;

pub const FINE_TUNED_MODEL: &str = "resnet18_finetuned.onnx";
pub const FINE_TUNED_LABELS: &str = "labels_finetuned.json";
pub const PRETRAINED_MODEL: &str = "resnet18.onnx";
pub const PRETRAINED_LABELS: &str = "labels.json";

/// A loaded (or failed-to-load) classification model.
///
/// Implementations hold immutable weights and perform one forward pass per
/// call, returning raw logits. Softmax is not applied here.
pub trait InferenceEngine: Send + Sync {
    /// Forward pass. Fails with [`ClassifyError::ModelUnavailable`] when no
    /// weights are loaded, or [`ClassifyError::Inference`] on runtime faults.
    fn infer(&self, tensor: &NormalizedTensor) -> Result<ScoreVector, ClassifyError>;

    /// Labels matching the loaded weights, in output order. `None` while
    /// unavailable.
    fn catalog(&self) -> Option<&LabelCatalog>;

    fn model_info(&self) -> Option<ModelInfo>;

    fn is_available(&self) -> bool {
        self.catalog().is_some()
    }
}

/// One candidate weight file with the labels that belong to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightSet {
    pub source: WeightSource,
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
}

impl WeightSet {
    /// Candidates in preference order: fine-tuned first, then pretrained.
    pub fn candidates(model_dir: &Path) -> [WeightSet; 2] {
        [
            WeightSet {
                source: WeightSource::FineTuned,
                model_path: model_dir.join(FINE_TUNED_MODEL),
                labels_path: model_dir.join(FINE_TUNED_LABELS),
            },
            WeightSet {
                source: WeightSource::Pretrained,
                model_path: model_dir.join(PRETRAINED_MODEL),
                labels_path: model_dir.join(PRETRAINED_LABELS),
            },
        ]
    }

    /// Model name reported in [`ModelInfo`], the weight file's stem.
    pub fn name(&self) -> String {
        self.model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.as_str().to_string())
    }

    /// Load the label catalog for this set.
    ///
    /// Fine-tuned weights without their own label file use the CIFAR-10
    /// labels they are trained on. Pretrained weights require `labels.json`.
    pub fn load_catalog(&self) -> anyhow::Result<LabelCatalog> {
        if self.source == WeightSource::FineTuned && !self.labels_path.exists() {
            return Ok(LabelCatalog::cifar10());
        }
        LabelCatalog::from_json_file(&self.labels_path)
    }
}

/// Output class count declared by a model, if fixed.
///
/// `None` for dynamic or unknown widths; those are checked per request.
pub fn declared_classes(dims: &[i64]) -> Option<usize> {
    dims.last()
        .and_then(|&d| if d > 0 { Some(d as usize) } else { None })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fine_tuned_preferred() {
        let sets = WeightSet::candidates(Path::new("models"));
        assert_eq!(sets[0].source, WeightSource::FineTuned);
        assert_eq!(sets[0].model_path, Path::new("models/resnet18_finetuned.onnx"));
        assert_eq!(sets[1].source, WeightSource::Pretrained);
        assert_eq!(sets[1].labels_path, Path::new("models/labels.json"));
        assert_eq!(sets[1].name(), "resnet18");
    }

    #[test]
    fn fine_tuned_defaults_to_cifar10_labels() {
        let dir = tempfile::tempdir().unwrap();
        let [fine_tuned, pretrained] = WeightSet::candidates(dir.path());
        assert_eq!(fine_tuned.load_catalog().unwrap(), LabelCatalog::cifar10());
        assert!(pretrained.load_catalog().is_err());
    }

    #[test]
    fn label_file_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(FINE_TUNED_LABELS), r#"["a", "b"]"#).unwrap();
        std::fs::write(dir.path().join(PRETRAINED_LABELS), r#"["x", "y", "z"]"#).unwrap();
        let [fine_tuned, pretrained] = WeightSet::candidates(dir.path());
        assert_eq!(fine_tuned.load_catalog().unwrap().len(), 2);
        assert_eq!(pretrained.load_catalog().unwrap().len(), 3);
    }

    #[test]
    fn declared_classes_ignores_dynamic_dims() {
        assert_eq!(declared_classes(&[-1, 1000]), Some(1000));
        assert_eq!(declared_classes(&[1, -1]), None);
        assert_eq!(declared_classes(&[]), None);
    }
}
