use screen_translate_types::Frame;

use crate::comparators::FrameComparator;
use crate::sampling::{ComparisonReport, sample_grid};

const TAG: &str = "sampled-exact";

/// Counts byte-exact RGBA matches on a sparse grid.
pub struct SampledExactComparator {
    stride: usize,
}

impl SampledExactComparator {
    pub fn new(stride: usize) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl FrameComparator for SampledExactComparator {
    fn name(&self) -> &'static str {
        TAG
    }

    fn compare(&self, previous: &Frame, current: &Frame) -> Option<ComparisonReport> {
        sample_grid(previous, current, self.stride, |a, b| a == b)
    }
}
