//! Image bytes to model input tensor.
//!
//! Recipe: decode, force RGB (gray replicated, alpha dropped), resize the
//! shorter edge to `resize_shorter` with bilinear (triangle) filtering,
//! center-crop to `crop_size` square, scale to `[0, 1]`, then subtract the
//! per-channel mean and divide by the per-channel std. Output is CHW.
//!
//! The crop window is mapped back to source pixels and only that window is
//! resampled, so working memory stays at `crop_size²` whatever the aspect
//! ratio of the input.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, RgbImage};
use tracing::debug;
use visionsense_core::{ClassifyError, ConfigError, NormalizedTensor, PreprocessConfig, RawImage};

const FILTER: FilterType = FilterType::Triangle;

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    config: PreprocessConfig,
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self {
            config: PreprocessConfig::default(),
        }
    }
}

impl ImageNormalizer {
    /// Rejects recipes that cannot produce a `crop_size` square.
    pub fn new(config: PreprocessConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Shape of every tensor this normalizer produces.
    pub fn output_shape(&self) -> [usize; 3] {
        self.config.tensor_shape()
    }

    /// Decode and normalize. Pure: the same bytes always give the same tensor.
    pub fn normalize(&self, raw: &RawImage) -> Result<NormalizedTensor, ClassifyError> {
        self.prepare(&decode(raw)?)
    }

    /// Normalize already-decoded pixels. Alpha is dropped, gray is expanded.
    pub fn prepare(&self, image: &DynamicImage) -> Result<NormalizedTensor, ClassifyError> {
        let cropped = self.resize_and_crop(&image.to_rgb8());
        self.to_tensor(&cropped)
    }

    /// The centered `crop_size` square of the image scaled so its shorter
    /// edge equals `resize_shorter`.
    pub fn resize_and_crop(&self, rgb: &RgbImage) -> RgbImage {
        let (w, h) = rgb.dimensions();
        let crop = self.config.crop_size;
        let side = source_crop_side(w.min(h), crop, self.config.resize_shorter);
        let x = (w - side) / 2;
        let y = (h - side) / 2;
        debug!(
            width = w,
            height = h,
            window = side,
            x,
            y,
            "center crop window"
        );

        let window = imageops::crop_imm(rgb, x, y, side, side).to_image();
        if side == crop {
            window
        } else {
            imageops::resize(&window, crop, crop, FILTER)
        }
    }

    fn to_tensor(&self, rgb: &RgbImage) -> Result<NormalizedTensor, ClassifyError> {
        let shape = self.output_shape();
        let plane = shape[1] * shape[2];
        let mut data = vec![0.0f32; shape[0] * plane];

        let PreprocessConfig { mean, std, .. } = self.config;
        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..3 {
                let v = f32::from(pixel.0[c]) / 255.0;
                data[c * plane + i] = (v - mean[c]) / std[c];
            }
        }

        NormalizedTensor::from_chw(shape, data).ok_or_else(|| {
            ClassifyError::ImageDecode(format!(
                "cropped image is {}x{}, expected {}x{}",
                rgb.width(),
                rgb.height(),
                shape[2],
                shape[1]
            ))
        })
    }
}

/// Decode raw bytes into pixels.
///
/// The format is sniffed from magic bytes; the declared content type is only
/// consulted when sniffing finds nothing.
pub fn decode(raw: &RawImage) -> Result<DynamicImage, ClassifyError> {
    if raw.is_empty() {
        return Err(ClassifyError::ImageDecode("empty payload".into()));
    }

    let mut reader = ImageReader::new(Cursor::new(raw.bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| ClassifyError::ImageDecode(e.to_string()))?;

    if reader.format().is_none()
        && let Some(format) = raw
            .content_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
    {
        debug!(?format, "format not sniffed, using declared content type");
        reader.set_format(format);
    }

    let image = reader
        .decode()
        .map_err(|e| ClassifyError::ImageDecode(e.to_string()))?;

    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifyError::ImageDecode(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image)
}

/// Side, in source pixels, of the square that becomes the `crop` square once
/// the shorter edge `short` is scaled to `resize_shorter`. Rounded, and kept
/// within `1..=short`.
fn source_crop_side(short: u32, crop: u32, resize_shorter: u32) -> u32 {
    let resize_shorter = u64::from(resize_shorter.max(1));
    let side = (u64::from(crop) * u64::from(short) + resize_shorter / 2) / resize_shorter;
    side.clamp(1, u64::from(short.max(1))) as u32
}
