//! Logits to ranked top-K predictions.

use std::cmp::Ordering;

use visionsense_core::{ClassifyError, Prediction, PredictionResult, ScoreVector};

use crate::labels::LabelCatalog;

/// Softmax, shifted by the maximum logit so large scores cannot overflow.
///
/// Computed in `f64`; callers narrow to `f32` for reporting.
pub fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = scores
        .iter()
        .map(|&s| (f64::from(s) - f64::from(max)).exp())
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Rank `scores` and keep the `k` most probable classes.
///
/// Order is descending confidence, then ascending class index, so the
/// result is fully determined by the input.
pub fn rank(
    scores: &ScoreVector,
    k: usize,
    catalog: &LabelCatalog,
) -> Result<PredictionResult, ClassifyError> {
    let classes = scores.len();
    if k == 0 || k > classes {
        return Err(ClassifyError::InvalidK { k, classes });
    }
    if let Some(i) = scores.as_slice().iter().position(|s| !s.is_finite()) {
        return Err(ClassifyError::Inference(format!(
            "non-finite score at class index {i}"
        )));
    }

    // Order on the reported (f32) values so equal reported confidences are
    // always in index order.
    let confidences: Vec<f32> = softmax(scores.as_slice())
        .into_iter()
        .map(|p| p as f32)
        .collect();
    let by_confidence = |a: &usize, b: &usize| -> Ordering {
        confidences[*b]
            .total_cmp(&confidences[*a])
            .then_with(|| a.cmp(b))
    };

    let mut order: Vec<usize> = (0..classes).collect();
    if k < classes {
        order.select_nth_unstable_by(k - 1, by_confidence);
        order.truncate(k);
    }
    order.sort_unstable_by(by_confidence);

    let predictions = order
        .into_iter()
        .map(|index| {
            let label = catalog.get(index).ok_or(ClassifyError::LabelLookup {
                index,
                catalog_len: catalog.len(),
            })?;
            Ok(Prediction {
                label: label.to_string(),
                confidence: confidences[index].clamp(0.0, 1.0),
            })
        })
        .collect::<Result<Vec<_>, ClassifyError>>()?;

    PredictionResult::new(predictions).ok_or(ClassifyError::InvalidK { k, classes })
}
