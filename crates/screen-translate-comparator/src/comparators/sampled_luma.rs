use screen_translate_types::Frame;

use crate::comparators::FrameComparator;
use crate::sampling::{ComparisonReport, sample_grid};

const TAG: &str = "sampled-luma";

/// Like [`SampledExactComparator`](super::SampledExactComparator) but tolerates
/// small brightness jitter, e.g. from compression or cursor blending.
pub struct SampledLumaComparator {
    stride: usize,
    delta: u8,
}

impl SampledLumaComparator {
    pub fn new(stride: usize, delta: u8) -> Self {
        Self {
            stride: stride.max(1),
            delta,
        }
    }
}

impl FrameComparator for SampledLumaComparator {
    fn name(&self) -> &'static str {
        TAG
    }

    fn compare(&self, previous: &Frame, current: &Frame) -> Option<ComparisonReport> {
        let delta = self.delta;
        sample_grid(previous, current, self.stride, |a, b| {
            luma(a).abs_diff(luma(b)) <= delta
        })
    }
}

/// BT.601 integer luma.
fn luma(px: &[u8]) -> u8 {
    let weighted = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
    (weighted / 1000) as u8
}
