//! Batch classification: reads files and runs them through the pipeline on
//! blocking worker tasks, a bounded number at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use image::ImageFormat;

use visionsense_ai::Pipeline;
use visionsense_core::{ClassifyError, PredictionResult, RawImage};

/// Why a file produced no prediction.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error(transparent)]
    Read(#[from] std::io::Error),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl Failure {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Read(_) => "read",
            Self::Classify(e) => e.kind().as_str(),
            Self::Worker(_) => "worker",
        }
    }
}

pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<PredictionResult, Failure>,
}

pub struct BatchStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
}

/// Classify every file, returning outcomes in input order.
pub async fn classify_files(
    pipeline: Arc<Pipeline>,
    files: &[PathBuf],
    top_k: Option<usize>,
    concurrency: usize,
) -> (Vec<FileOutcome>, BatchStats) {
    let start = Instant::now();

    let outcomes: Vec<FileOutcome> = stream::iter(files.iter().cloned())
        .map(|path| classify_file(pipeline.clone(), path, top_k))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    let stats = BatchStats {
        total: outcomes.len(),
        succeeded: outcomes.len() - failed,
        failed,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };
    (outcomes, stats)
}

async fn classify_file(
    pipeline: Arc<Pipeline>,
    path: PathBuf,
    top_k: Option<usize>,
) -> FileOutcome {
    let result = match tokio::fs::read(&path).await {
        Err(e) => Err(e.into()),
        Ok(bytes) => {
            let raw = raw_image(&path, bytes);
            match tokio::task::spawn_blocking(move || pipeline.classify(&raw, top_k)).await {
                Ok(classified) => classified.map_err(Failure::from),
                Err(e) => Err(e.into()),
            }
        }
    };
    FileOutcome { path, result }
}

/// Wrap file bytes with the file name and the MIME type its extension implies.
pub fn raw_image(path: &Path, bytes: Vec<u8>) -> RawImage {
    let mut raw = RawImage::new(bytes);
    if let Some(name) = path.file_name() {
        raw = raw.with_filename(name.to_string_lossy());
    }
    if let Ok(format) = ImageFormat::from_path(path) {
        raw = raw.with_content_type(format.to_mime_type());
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use image::{Rgb, RgbImage};
    use visionsense_ai::{InferenceEngine, LabelCatalog};
    use visionsense_core::{
        ClassifierConfig, ErrorKind, ModelInfo, NormalizedTensor, ScoreVector,
    };

    /// Always predicts "truck".
    struct TruckEngine(LabelCatalog);

    impl InferenceEngine for TruckEngine {
        fn infer(&self, _tensor: &NormalizedTensor) -> Result<ScoreVector, ClassifyError> {
            let mut logits = vec![0.0; 10];
            logits[9] = 6.0;
            Ok(ScoreVector::new(logits))
        }

        fn catalog(&self) -> Option<&LabelCatalog> {
            Some(&self.0)
        }

        fn model_info(&self) -> Option<ModelInfo> {
            None
        }
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut bytes = Vec::new();
        RgbImage::from_pixel(20, 20, Rgb([10, 120, 200]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn ready_pipeline() -> Arc<Pipeline> {
        let pipeline = Arc::new(Pipeline::new(&ClassifierConfig::default()).unwrap());
        pipeline.initialize(Arc::new(TruckEngine(LabelCatalog::cifar10())));
        pipeline
    }

    #[test]
    fn failure_kinds_and_messages() {
        let read = Failure::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(read.kind(), "read");
        assert_eq!(read.to_string(), "gone");

        let decode = ClassifyError::ImageDecode("empty payload".into());
        let classify = Failure::from(decode.clone());
        assert_eq!(classify.kind(), "image_decode");
        assert_eq!(classify.to_string(), decode.to_string());

        let as_error: &dyn std::error::Error = &classify;
        assert!(as_error.to_string().contains("empty payload"));
    }

    #[tokio::test]
    async fn panicking_worker_is_a_failure() {
        let join_err = tokio::task::spawn_blocking(|| -> u8 { panic!("worker died") })
            .await
            .unwrap_err();
        let failure = Failure::from(join_err);
        assert_eq!(failure.kind(), "worker");
        assert!(failure.to_string().starts_with("worker task failed"));
        assert!(std::error::Error::source(&failure).is_some());
    }

    #[test]
    fn raw_image_uses_extension() {
        let raw = raw_image(Path::new("/tmp/photos/cat.JPG"), vec![1, 2, 3]);
        assert_eq!(raw.filename.as_deref(), Some("cat.JPG"));
        assert_eq!(raw.content_type.as_deref(), Some("image/jpeg"));

        let raw = raw_image(Path::new("notes.txt"), vec![]);
        assert_eq!(raw.content_type, None);
    }

    #[tokio::test]
    async fn outcomes_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write_png(dir.path(), "a.png"),
            dir.path().join("missing.png"),
            write_png(dir.path(), "b.png"),
        ];

        let (outcomes, stats) = classify_files(ready_pipeline(), &files, Some(2), 2).await;

        let paths: Vec<&PathBuf> = outcomes.iter().map(|o| &o.path).collect();
        assert_eq!(paths, files.iter().collect::<Vec<_>>());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.succeeded, 2);
        assert_eq!(stats.failed, 1);

        let first = outcomes[0].result.as_ref().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.top().label, "truck");
        assert_eq!(outcomes[1].result.as_ref().unwrap_err().kind(), "read");
    }

    #[tokio::test]
    async fn uninitialized_pipeline_fails_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![write_png(dir.path(), "a.png"), write_png(dir.path(), "b.png")];
        let pipeline = Arc::new(Pipeline::new(&ClassifierConfig::default()).unwrap());

        let (outcomes, stats) = classify_files(pipeline, &files, None, 4).await;
        assert_eq!(stats.failed, 2);
        for outcome in outcomes {
            match outcome.result {
                Err(Failure::Classify(e)) => assert_eq!(e.kind(), ErrorKind::ModelUnavailable),
                other => panic!("expected model unavailable, got {:?}", other.err()),
            }
        }
    }

    #[tokio::test]
    async fn successes_land_in_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<PathBuf> = (0..6)
            .map(|i| write_png(dir.path(), &format!("img{i}.png")))
            .collect();
        let pipeline = ready_pipeline();

        let (_, stats) = classify_files(pipeline.clone(), &files, None, 3).await;
        assert_eq!(stats.succeeded, 6);
        assert_eq!(pipeline.recent_predictions(10).len(), 6);
    }
}
