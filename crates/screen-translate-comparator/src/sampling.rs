use screen_translate_types::{BYTES_PER_PIXEL, Frame};

/// Result of walking the sample grid over two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonReport {
    pub matched: usize,
    pub sampled: usize,
}

impl ComparisonReport {
    /// Fraction of sampled pixels that matched. Two empty frames are identical.
    pub fn similarity(&self) -> f32 {
        if self.sampled == 0 {
            1.0
        } else {
            self.matched as f32 / self.sampled as f32
        }
    }

    pub fn meets(&self, threshold: f32) -> bool {
        self.similarity() >= threshold
    }
}

/// Visits every `stride`-th pixel in both axes of two equally sized frames and
/// counts the positions `same` accepts. `None` when the dimensions differ.
pub(crate) fn sample_grid<F>(
    previous: &Frame,
    current: &Frame,
    stride: usize,
    same: F,
) -> Option<ComparisonReport>
where
    F: Fn(&[u8], &[u8]) -> bool,
{
    if !previous.same_dimensions(current) {
        return None;
    }
    let stride = stride.max(1);
    let width = previous.width() as usize;
    let height = previous.height() as usize;
    let row_bytes = width * BYTES_PER_PIXEL;
    let (a, b) = (previous.data(), current.data());

    let mut report = ComparisonReport {
        matched: 0,
        sampled: 0,
    };
    for y in (0..height).step_by(stride) {
        let row = y * row_bytes;
        for x in (0..width).step_by(stride) {
            let offset = row + x * BYTES_PER_PIXEL;
            let end = offset + BYTES_PER_PIXEL;
            report.sampled += 1;
            if same(&a[offset..end], &b[offset..end]) {
                report.matched += 1;
            }
        }
    }
    Some(report)
}
