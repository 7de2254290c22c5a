use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use screen_translate_types::{BYTES_PER_PIXEL, CaptureError, CaptureResult, Frame};

use crate::core::{CaptureSurface, DisplayMetrics, RawImage, SurfaceProvider};
use crate::token::CaptureToken;

/// In-memory display whose contents are published by the caller.
///
/// Surfaces hand out row-padded images, the way hardware image readers do,
/// so every frame goes through stride correction.
#[derive(Clone)]
pub struct SyntheticDisplay {
    inner: Arc<SyntheticInner>,
}

struct SyntheticInner {
    metrics: DisplayMetrics,
    row_padding_px: usize,
    contents: Mutex<Option<Vec<u8>>>,
    deny_grants: AtomicBool,
    fail_allocation: AtomicBool,
    allocations: AtomicUsize,
    releases: AtomicUsize,
}

impl SyntheticDisplay {
    const DEFAULT_ROW_PADDING_PX: usize = 16;

    pub fn new(width: u32, height: u32) -> Self {
        Self::build(width, height, Self::DEFAULT_ROW_PADDING_PX)
    }

    /// Builder-style override of the row padding; call before sharing the display.
    pub fn with_row_padding(self, padding_px: usize) -> Self {
        let metrics = self.inner.metrics;
        let display = Self::build(metrics.width, metrics.height, padding_px);
        *display.inner.contents.lock() = self.inner.contents.lock().clone();
        display
    }

    /// Display pre-filled with a deterministic gradient.
    pub fn with_test_pattern(width: u32, height: u32) -> Self {
        let display = Self::new(width, height);
        let mut data = vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL];
        for (index, px) in data.chunks_exact_mut(BYTES_PER_PIXEL).enumerate() {
            let x = index % width.max(1) as usize;
            let y = index / width.max(1) as usize;
            px.copy_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]);
        }
        *display.inner.contents.lock() = Some(data);
        display
    }

    fn build(width: u32, height: u32, row_padding_px: usize) -> Self {
        Self {
            inner: Arc::new(SyntheticInner {
                metrics: DisplayMetrics::new(width, height),
                row_padding_px,
                contents: Mutex::new(None),
                deny_grants: AtomicBool::new(false),
                fail_allocation: AtomicBool::new(false),
                allocations: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
            }),
        }
    }

    /// Replaces the displayed pixels with tightly packed RGBA data.
    pub fn show(&self, rgba: Vec<u8>) -> CaptureResult<()> {
        let metrics = self.inner.metrics;
        let expected = metrics.width as usize * metrics.height as usize * BYTES_PER_PIXEL;
        if rgba.len() != expected {
            return Err(CaptureError::InvalidFrame {
                reason: format!(
                    "synthetic display expects {} bytes, got {}",
                    expected,
                    rgba.len()
                ),
            });
        }
        *self.inner.contents.lock() = Some(rgba);
        Ok(())
    }

    pub fn show_frame(&self, frame: &Frame) -> CaptureResult<()> {
        self.show(frame.data().to_vec())
    }

    pub fn fill(&self, rgba: [u8; 4]) {
        let metrics = self.inner.metrics;
        let pixels = metrics.width as usize * metrics.height as usize;
        *self.inner.contents.lock() = Some(rgba.repeat(pixels));
    }

    /// Mutates the current contents in place; no-op while blank.
    pub fn paint(&self, painter: impl FnOnce(&mut [u8])) {
        if let Some(contents) = self.inner.contents.lock().as_mut() {
            painter(contents);
        }
    }

    /// Makes surfaces report no image, as before the mirror produced one.
    pub fn blank(&self) {
        *self.inner.contents.lock() = None;
    }

    pub fn deny_grants(&self, deny: bool) {
        self.inner.deny_grants.store(deny, Ordering::SeqCst);
    }

    pub fn fail_allocation(&self, fail: bool) {
        self.inner.fail_allocation.store(fail, Ordering::SeqCst);
    }

    pub fn allocations(&self) -> usize {
        self.inner.allocations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.inner.releases.load(Ordering::SeqCst)
    }

    fn padded_image(&self) -> Option<RawImage> {
        let contents = self.inner.contents.lock();
        let data = contents.as_ref()?;
        let metrics = self.inner.metrics;
        let visible_row = metrics.width as usize * BYTES_PER_PIXEL;
        let row_stride = visible_row + self.inner.row_padding_px * BYTES_PER_PIXEL;
        let mut padded = vec![0u8; row_stride * metrics.height as usize];
        for (row, chunk) in data.chunks_exact(visible_row.max(1)).enumerate() {
            let offset = row * row_stride;
            padded[offset..offset + visible_row].copy_from_slice(chunk);
        }
        Some(RawImage {
            width: metrics.width,
            height: metrics.height,
            pixel_stride: BYTES_PER_PIXEL,
            row_stride,
            data: padded,
        })
    }
}

impl SurfaceProvider for SyntheticDisplay {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn display(&self) -> DisplayMetrics {
        self.inner.metrics
    }

    fn resource_key(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    fn grant(&self, _token: &CaptureToken) -> CaptureResult<()> {
        if self.inner.deny_grants.load(Ordering::SeqCst) {
            return Err(CaptureError::permission_denied(
                "synthetic display rejected the grant",
            ));
        }
        Ok(())
    }

    fn allocate(&self, _display: DisplayMetrics) -> CaptureResult<Arc<dyn CaptureSurface>> {
        if self.inner.fail_allocation.load(Ordering::SeqCst) {
            return Err(CaptureError::resource_unavailable(
                "synthetic display refused to allocate a surface",
            ));
        }
        self.inner.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SyntheticSurface {
            display: self.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

struct SyntheticSurface {
    display: SyntheticDisplay,
    released: AtomicBool,
}

impl CaptureSurface for SyntheticSurface {
    fn acquire_latest(&self) -> Option<RawImage> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        self.display.padded_image()
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.display.inner.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}
