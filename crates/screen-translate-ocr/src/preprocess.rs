use screen_translate_types::{BYTES_PER_PIXEL, Frame, TextRegion};
use tracing::debug;

use crate::engine::TextDetector;
use crate::error::DetectError;
use crate::request::DetectRequest;

pub const DEFAULT_CONTRAST: f32 = 1.5;

// Saturation-zero colour matrix weights.
const RED_WEIGHT: f32 = 0.213;
const GREEN_WEIGHT: f32 = 0.715;
const BLUE_WEIGHT: f32 = 0.072;

/// Returns a desaturated, contrast-stretched copy of `frame`. Alpha is kept.
pub fn enhance(frame: &Frame, contrast: f32) -> Result<Frame, DetectError> {
    let offset = (1.0 - contrast) / 2.0 * 255.0;
    let mut data = Vec::with_capacity(frame.data().len());
    for px in frame.data().chunks_exact(BYTES_PER_PIXEL) {
        let gray =
            px[0] as f32 * RED_WEIGHT + px[1] as f32 * GREEN_WEIGHT + px[2] as f32 * BLUE_WEIGHT;
        let value = (gray * contrast + offset).round().clamp(0.0, 255.0) as u8;
        data.extend_from_slice(&[value, value, value, px[3]]);
    }
    Frame::from_rgba(frame.width(), frame.height(), frame.captured_at(), data)
        .map_err(|err| DetectError::failed(format!("preprocessing failed: {err}")))
}

/// Wraps a detector so it sees an enhanced copy of every frame.
pub struct PreprocessingDetector<D> {
    inner: D,
    contrast: f32,
}

impl<D: TextDetector> PreprocessingDetector<D> {
    pub fn new(inner: D) -> Self {
        Self::with_contrast(inner, DEFAULT_CONTRAST)
    }

    pub fn with_contrast(inner: D, contrast: f32) -> Self {
        Self { inner, contrast }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: TextDetector> TextDetector for PreprocessingDetector<D> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn warm_up(&self) -> Result<(), DetectError> {
        self.inner.warm_up()
    }

    fn detect(&self, request: &DetectRequest<'_>) -> Result<Vec<TextRegion>, DetectError> {
        let enhanced = enhance(request.frame(), self.contrast)?;
        debug!(
            detector = self.inner.name(),
            contrast = self.contrast,
            "running detector on enhanced frame"
        );
        self.inner
            .detect(&DetectRequest::new(&enhanced, request.language()))
    }
}
