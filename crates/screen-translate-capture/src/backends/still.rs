use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use screen_translate_types::{BYTES_PER_PIXEL, CaptureError, CaptureResult};

use crate::core::{CaptureSurface, DisplayMetrics, DynSurfaceProvider, RawImage, SurfaceProvider};

/// Display backed by a screenshot on disk. Every acquire re-reads the file,
/// so replacing the image changes what the next scan sees.
pub struct StillImageProvider {
    path: PathBuf,
    metrics: DisplayMetrics,
}

impl StillImageProvider {
    pub fn open(path: impl Into<PathBuf>) -> CaptureResult<Self> {
        let path = path.into();
        let (width, height) = image::image_dimensions(&path).map_err(|err| {
            CaptureError::configuration(format!(
                "failed to read image '{}': {err}",
                path.display()
            ))
        })?;
        Ok(Self {
            path,
            metrics: DisplayMetrics::new(width, height),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SurfaceProvider for StillImageProvider {
    fn name(&self) -> &'static str {
        "still"
    }

    fn display(&self) -> DisplayMetrics {
        self.metrics
    }

    fn allocate(&self, display: DisplayMetrics) -> CaptureResult<Arc<dyn CaptureSurface>> {
        if !self.path.is_file() {
            return Err(CaptureError::resource_unavailable(format!(
                "image '{}' is no longer available",
                self.path.display()
            )));
        }
        Ok(Arc::new(StillSurface {
            path: self.path.clone(),
            display,
            released: AtomicBool::new(false),
        }))
    }
}

struct StillSurface {
    path: PathBuf,
    display: DisplayMetrics,
    released: AtomicBool,
}

impl CaptureSurface for StillSurface {
    fn acquire_latest(&self) -> Option<RawImage> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        let decoded = match image::open(&self.path) {
            Ok(decoded) => decoded.to_rgba8(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "still image unreadable");
                return None;
            }
        };
        if decoded.width() != self.display.width || decoded.height() != self.display.height {
            tracing::warn!(
                path = %self.path.display(),
                expected = %format!("{}x{}", self.display.width, self.display.height),
                actual = %format!("{}x{}", decoded.width(), decoded.height()),
                "still image changed size; ignoring"
            );
            return None;
        }
        Some(RawImage {
            width: decoded.width(),
            height: decoded.height(),
            pixel_stride: BYTES_PER_PIXEL,
            row_stride: decoded.width() as usize * BYTES_PER_PIXEL,
            data: decoded.into_raw(),
        })
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

pub fn boxed_still(path: PathBuf) -> CaptureResult<DynSurfaceProvider> {
    Ok(Arc::new(StillImageProvider::open(path)?))
}
