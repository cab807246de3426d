//! Class-index to label-name catalog.
//!
//! Labels are an immutable array indexed by class id, built once when a
//! weight set is loaded. Label files are JSON arrays of strings, one entry
//! per model output, in output order.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use tracing::warn;

/// Labels of the CIFAR-10 task the fine-tuned weights are trained for.
pub const CIFAR10_LABELS: &[&str] = &[
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelCatalog {
    labels: Box<[String]>,
}

impl LabelCatalog {
    /// Build from labels in class-index order. Empty catalogs are rejected.
    pub fn from_labels<I, S>(labels: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        anyhow::ensure!(!labels.is_empty(), "label catalog is empty");

        let catalog = Self {
            labels: labels.into_boxed_slice(),
        };
        let dupes = catalog.duplicates();
        if !dupes.is_empty() {
            warn!(duplicates = ?dupes, "label catalog contains repeated names");
        }
        Ok(catalog)
    }

    /// Load a JSON array of strings.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        anyhow::ensure!(path.exists(), "label file not found: {path:?}");
        let text =
            std::fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
        let labels: Vec<String> =
            serde_json::from_str(&text).with_context(|| format!("parsing {path:?}"))?;
        Self::from_labels(labels).with_context(|| format!("loading {path:?}"))
    }

    pub fn cifar10() -> Self {
        Self {
            labels: CIFAR10_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Label for a class index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Names that appear more than once, in first-repeat order.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut dupes = Vec::new();
        for label in self.iter() {
            if !seen.insert(label) && !dupes.contains(&label) {
                dupes.push(label);
            }
        }
        dupes
    }
}
