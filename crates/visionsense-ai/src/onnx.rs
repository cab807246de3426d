//! ONNX Runtime backend for ResNet-18 classification weights.
//!
//! The model directory may contain either or both weight sets:
//! `resnet18_finetuned.onnx` (with optional `labels_finetuned.json`) and
//! `resnet18.onnx` with `labels.json`. The fine-tuned set is preferred.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tracing::{error, info, warn};

use visionsense_core::{
    ClassifierConfig, ClassifyError, ModelInfo, NormalizedTensor, ScoreVector, WeightSource,
};

use crate::engine::{InferenceEngine, WeightSet, declared_classes};
use crate::labels::LabelCatalog;

/// Classification engine backed by an ONNX Runtime session.
///
/// Loading never fails: when no weight set can be opened the engine stays
/// unavailable and every forward pass returns
/// [`ClassifyError::ModelUnavailable`].
pub struct OnnxEngine {
    model: Option<LoadedModel>,
}

struct LoadedModel {
    session: Mutex<Session>,
    input_name: String,
    input_shape: [usize; 3],
    catalog: LabelCatalog,
    source: WeightSource,
    name: String,
    path: PathBuf,
}

impl OnnxEngine {
    /// Open the first usable weight set under `model_dir`.
    pub fn load(model_dir: &Path, input_name: &str, input_shape: [usize; 3]) -> Self {
        for set in WeightSet::candidates(model_dir) {
            match LoadedModel::open(&set, input_name, input_shape) {
                Ok(model) => {
                    info!(
                        weights = model.source.as_str(),
                        classes = model.catalog.len(),
                        model = %model.path.display(),
                        "loaded classification model"
                    );
                    return Self { model: Some(model) };
                }
                Err(e) => warn!(
                    weights = set.source.as_str(),
                    model = %set.model_path.display(),
                    "skipping weight set: {e:#}"
                ),
            }
        }
        error!(dir = %model_dir.display(), "no usable weights, classification unavailable");
        Self::unavailable()
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self::load(
            &config.model_dir,
            &config.input_name,
            config.preprocess.tensor_shape(),
        )
    }

    pub fn unavailable() -> Self {
        Self { model: None }
    }

    /// Path of the loaded weight file.
    pub fn model_path(&self) -> Option<&Path> {
        self.model.as_ref().map(|m| m.path.as_path())
    }
}

impl InferenceEngine for OnnxEngine {
    fn infer(&self, tensor: &NormalizedTensor) -> Result<ScoreVector, ClassifyError> {
        let model = self.model.as_ref().ok_or_else(|| {
            ClassifyError::ModelUnavailable("no weight set loaded".to_string())
        })?;
        model.run(tensor)
    }

    fn catalog(&self) -> Option<&LabelCatalog> {
        self.model.as_ref().map(|m| &m.catalog)
    }

    fn model_info(&self) -> Option<ModelInfo> {
        self.model.as_ref().map(|m| {
            let [c, h, w] = m.input_shape;
            ModelInfo {
                name: m.name.clone(),
                weights: m.source,
                num_classes: m.catalog.len(),
                input_shape: [1, c, h, w],
            }
        })
    }
}

impl LoadedModel {
    fn open(set: &WeightSet, input_name: &str, input_shape: [usize; 3]) -> anyhow::Result<Self> {
        anyhow::ensure!(
            set.model_path.exists(),
            "{} not found",
            set.model_path.display()
        );
        let catalog = set.load_catalog()?;

        let session = Session::builder()?.commit_from_file(&set.model_path)?;

        anyhow::ensure!(
            session.inputs().iter().any(|i| i.name() == input_name),
            "model has no input named {input_name:?}"
        );
        // Dynamic widths are checked on every forward pass instead.
        if let Some(classes) = session.outputs().first().and_then(|o| output_classes(o.dtype())) {
            anyhow::ensure!(
                classes == catalog.len(),
                "model emits {classes} classes but catalog has {} labels",
                catalog.len()
            );
        }

        Ok(Self {
            session: Mutex::new(session),
            input_name: input_name.to_string(),
            input_shape,
            catalog,
            source: set.source,
            name: set.name(),
            path: set.model_path.clone(),
        })
    }

    fn run(&self, tensor: &NormalizedTensor) -> Result<ScoreVector, ClassifyError> {
        if tensor.shape() != self.input_shape {
            return Err(ClassifyError::Inference(format!(
                "tensor shape {:?} does not match model input {:?}",
                tensor.shape(),
                self.input_shape
            )));
        }
        let [c, h, w] = self.input_shape;
        let shape = [1i64, c as i64, h as i64, w as i64];
        let input = Tensor::from_array((shape, tensor.as_slice().to_vec().into_boxed_slice()))
            .map_err(inference)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClassifyError::Inference("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(inference)?;

        // Logits: [1, classes].
        let (output_shape, output_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference)?;
        let dims: &[i64] = output_shape;
        let classes = self.catalog.len();
        if dims.len() != 2 || dims[0] != 1 || dims[1] as usize != classes {
            return Err(ClassifyError::Inference(format!(
                "unexpected output shape: {dims:?}, expected [1, {classes}]"
            )));
        }
        if let Some(i) = output_data.iter().position(|v| !v.is_finite()) {
            return Err(ClassifyError::Inference(format!(
                "non-finite logit at class index {i}"
            )));
        }
        Ok(ScoreVector::new(output_data.to_vec()))
    }
}

fn output_classes(output_type: &ort::value::ValueType) -> Option<usize> {
    match output_type {
        ort::value::ValueType::Tensor { shape, .. } => declared_classes(&shape[..]),
        _ => None,
    }
}

fn inference(e: impl Display) -> ClassifyError {
    ClassifyError::Inference(e.to_string())
}
