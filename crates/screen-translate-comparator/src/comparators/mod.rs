pub mod sampled_exact;
pub mod sampled_luma;

pub use sampled_exact::SampledExactComparator;
pub use sampled_luma::SampledLumaComparator;

use crate::sampling::ComparisonReport;
use screen_translate_types::Frame;

/// Trait implemented by all frame comparators.
pub trait FrameComparator: Send + Sync {
    /// Stable comparator name used for logging and diagnostics.
    fn name(&self) -> &'static str;

    /// Compares two frames. Returns `None` when they cannot be compared at all,
    /// which callers treat as "changed".
    fn compare(&self, previous: &Frame, current: &Frame) -> Option<ComparisonReport>;

    fn is_similar(&self, previous: &Frame, current: &Frame, threshold: f32) -> bool {
        self.compare(previous, current)
            .is_some_and(|report| report.meets(threshold))
    }
}
