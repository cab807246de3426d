use thiserror::Error;

/// Typed failure of one classification stage.
///
/// The orchestrator forwards these unchanged; callers map [`ErrorKind`] to
/// whatever response codes their surface uses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid top-k {k}: must be between 1 and {classes}")]
    InvalidK { k: usize, classes: usize },

    #[error("no label for class index {index} (catalog has {catalog_len} labels)")]
    LabelLookup { index: usize, catalog_len: usize },
}

/// Failure kind, stable across messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ImageDecode,
    ModelUnavailable,
    Inference,
    InvalidK,
    LabelLookup,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ImageDecode => "image_decode",
            Self::ModelUnavailable => "model_unavailable",
            Self::Inference => "inference",
            Self::InvalidK => "invalid_k",
            Self::LabelLookup => "label_lookup",
        }
    }

    /// True when the request itself was bad and resubmitting it unchanged
    /// cannot succeed.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::ImageDecode | Self::InvalidK)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ClassifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageDecode(_) => ErrorKind::ImageDecode,
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::Inference(_) => ErrorKind::Inference,
            Self::InvalidK { .. } => ErrorKind::InvalidK,
            Self::LabelLookup { .. } => ErrorKind::LabelLookup,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(std::path::PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
