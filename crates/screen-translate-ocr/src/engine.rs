use screen_translate_types::TextRegion;

use crate::error::DetectError;
use crate::request::DetectRequest;

/// Common interface for all text detectors.
///
/// Implementations only read the frame and must report bounds in frame pixel
/// coordinates. `detect` is synchronous; callers run it on a blocking thread.
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn warm_up(&self) -> Result<(), DetectError> {
        Ok(())
    }

    fn detect(&self, request: &DetectRequest<'_>) -> Result<Vec<TextRegion>, DetectError>;
}

/// Detector that never finds text. Used when no backend is configured.
#[derive(Debug, Default)]
pub struct NoopDetector;

impl TextDetector for NoopDetector {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn detect(&self, _: &DetectRequest<'_>) -> Result<Vec<TextRegion>, DetectError> {
        Ok(Vec::new())
    }
}
