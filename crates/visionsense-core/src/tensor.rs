//! Request payload and the numeric arrays that flow between pipeline stages.

/// Uploaded image bytes as received, before any decoding.
///
/// Nothing is assumed about dimensions, channel count, or even whether the
/// bytes are an image at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    /// Declared MIME type, e.g. `image/png`. Only a hint.
    pub content_type: Option<String>,
    /// Name the caller knows the upload by; recorded in the ledger.
    pub filename: Option<String>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: None,
            filename: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Model input: a `[channels, height, width]` float tensor in RGB order,
/// already mean/std normalized. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    shape: [usize; 3],
    data: Box<[f32]>,
}

impl NormalizedTensor {
    /// Wrap channel-major data. Returns `None` if `data` does not hold
    /// exactly `shape[0] * shape[1] * shape[2]` values.
    pub fn from_chw(shape: [usize; 3], data: Vec<f32>) -> Option<Self> {
        if shape.iter().product::<usize>() != data.len() {
            return None;
        }
        Some(Self {
            shape,
            data: data.into_boxed_slice(),
        })
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn channels(&self) -> usize {
        self.shape[0]
    }

    pub fn height(&self) -> usize {
        self.shape[1]
    }

    pub fn width(&self) -> usize {
        self.shape[2]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at `(channel, row, col)`.
    pub fn get(&self, c: usize, y: usize, x: usize) -> Option<f32> {
        if c >= self.shape[0] || y >= self.shape[1] || x >= self.shape[2] {
            return None;
        }
        Some(self.data[(c * self.shape[1] + y) * self.shape[2] + x])
    }
}

/// Raw per-class model outputs (logits), one per class index.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Box<[f32]>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores.into_boxed_slice())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self::new(scores)
    }
}
