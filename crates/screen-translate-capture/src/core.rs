use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use screen_translate_types::{BYTES_PER_PIXEL, CaptureError, CaptureResult, Frame};

use crate::token::CaptureToken;

pub type DynSurfaceProvider = Arc<dyn SurfaceProvider>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    pub density_dpi: u32,
}

impl DisplayMetrics {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            density_dpi: 160,
        }
    }
}

/// Image as handed out by a capture surface, rows possibly padded.
#[derive(Clone)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixel_stride: usize,
    pub row_stride: usize,
    pub data: Vec<u8>,
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_stride", &self.pixel_stride)
            .field("row_stride", &self.row_stride)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl RawImage {
    /// Width of the buffer once row padding is counted as pixels.
    pub fn padded_width(&self) -> usize {
        let width = self.width as usize;
        let padding = self.row_stride.saturating_sub(self.pixel_stride * width);
        width + padding / self.pixel_stride.max(1)
    }

    /// Crops the padded buffer down to the declared width and height.
    pub fn into_frame(self, captured_at: Instant) -> CaptureResult<Frame> {
        if self.pixel_stride != BYTES_PER_PIXEL {
            return Err(CaptureError::InvalidFrame {
                reason: format!(
                    "unsupported pixel stride {} (expected {})",
                    self.pixel_stride, BYTES_PER_PIXEL
                ),
            });
        }
        let width = self.width as usize;
        let height = self.height as usize;
        if self.row_stride < width * BYTES_PER_PIXEL {
            return Err(CaptureError::InvalidFrame {
                reason: format!(
                    "row stride {} is smaller than {} pixels",
                    self.row_stride, width
                ),
            });
        }

        let row_step = self.row_stride;
        let visible_row = width * BYTES_PER_PIXEL;
        let required = match height {
            0 => 0,
            rows => row_step * (rows - 1) + visible_row,
        };
        if self.data.len() < required {
            return Err(CaptureError::InvalidFrame {
                reason: format!(
                    "insufficient image bytes: got {} expected at least {}",
                    self.data.len(),
                    required
                ),
            });
        }

        if row_step == visible_row {
            let mut data = self.data;
            data.truncate(visible_row * height);
            return Frame::from_rgba(self.width, self.height, captured_at, data);
        }

        let mut data = Vec::with_capacity(visible_row * height);
        for row in 0..height {
            let offset = row * row_step;
            data.extend_from_slice(&self.data[offset..offset + visible_row]);
        }
        Frame::from_rgba(self.width, self.height, captured_at, data)
    }
}

/// Mirror of the display that fills asynchronously once allocated.
pub trait CaptureSurface: Send + Sync {
    /// Newest image the surface has received, if any arrived yet.
    fn acquire_latest(&self) -> Option<RawImage>;

    /// Releases the platform resources backing the surface. Idempotent.
    fn release(&self);
}

/// Platform capture facility: validates grants and allocates surfaces.
pub trait SurfaceProvider: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn display(&self) -> DisplayMetrics;

    /// Identity of the display behind this provider. Providers that mirror the
    /// same display must report the same key.
    fn resource_key(&self) -> usize {
        self as *const Self as *const () as usize
    }

    fn grant(&self, _token: &CaptureToken) -> CaptureResult<()> {
        Ok(())
    }

    fn allocate(&self, display: DisplayMetrics) -> CaptureResult<Arc<dyn CaptureSurface>>;
}
