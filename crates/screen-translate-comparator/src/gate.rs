use std::sync::Arc;

use screen_translate_types::Frame;
use tracing::debug;

use crate::comparators::FrameComparator;

/// Holds the baseline frame and decides whether a new capture is worth
/// processing.
///
/// The baseline only moves on [`ChangeGate::accept`]; frames judged unchanged
/// never replace it, so slow drift is still caught once it crosses the
/// threshold relative to the last processed frame.
pub struct ChangeGate {
    comparator: Arc<dyn FrameComparator>,
    threshold: f32,
    baseline: Option<Frame>,
}

impl ChangeGate {
    pub fn new(comparator: Arc<dyn FrameComparator>, threshold: f32) -> Self {
        Self {
            comparator,
            threshold: threshold.clamp(0.0, 1.0),
            baseline: None,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn comparator_name(&self) -> &'static str {
        self.comparator.name()
    }

    pub fn baseline(&self) -> Option<&Frame> {
        self.baseline.as_ref()
    }

    pub fn is_similar(&self, previous: &Frame, current: &Frame) -> bool {
        self.comparator.is_similar(previous, current, self.threshold)
    }

    /// True when a baseline exists and `frame` is similar to it.
    pub fn is_unchanged(&self, frame: &Frame) -> bool {
        let Some(baseline) = self.baseline.as_ref() else {
            return false;
        };
        match self.comparator.compare(baseline, frame) {
            Some(report) => {
                debug!(
                    comparator = self.comparator.name(),
                    similarity = report.similarity(),
                    threshold = self.threshold,
                    "gate comparison"
                );
                report.meets(self.threshold)
            }
            None => false,
        }
    }

    pub fn accept(&mut self, frame: Frame) {
        self.baseline = Some(frame);
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }
}
