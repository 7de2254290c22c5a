use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use screen_translate_types::{Rect, TranslationEntry};

use crate::ledger::DedupLedger;

pub const MIN_LABEL_WIDTH: u32 = 48;
pub const MIN_FONT_PX: f32 = 10.0;
pub const MAX_FONT_PX: f32 = 28.0;
const FONT_SCALE: f32 = 0.6;

pub type LabelId = u64;

/// Where and how large a label is drawn, in frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLayout {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
    pub font_px: f32,
}

impl LabelLayout {
    pub fn for_bounds(bounds: Rect) -> Self {
        let height = bounds.height().max(1);
        Self {
            left: bounds.left,
            top: bounds.top,
            width: bounds.width().max(MIN_LABEL_WIDTH),
            height,
            font_px: (height as f32 * FONT_SCALE).clamp(MIN_FONT_PX, MAX_FONT_PX),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub id: LabelId,
    pub entry: TranslationEntry,
    pub layout: LabelLayout,
    pub shown_at: Instant,
}

/// Surface that actually draws labels. Calls arrive from the pipeline task.
pub trait OverlaySink: Send + Sync {
    fn show(&self, label: &Label);

    fn hide(&self, id: LabelId);

    fn show_scan_indicator(&self) {}

    fn hide_scan_indicator(&self) {}
}

/// Sink that draws nothing.
#[derive(Debug, Default)]
pub struct NullSink;

impl OverlaySink for NullSink {
    fn show(&self, _: &Label) {}

    fn hide(&self, _: LabelId) {}
}

/// Owns the rendered labels and the dedup ledger that shares their lifetime.
pub struct OverlayManager {
    sink: Arc<dyn OverlaySink>,
    labels: Vec<Label>,
    ledger: DedupLedger,
    next_id: LabelId,
    ttl: Option<Duration>,
}

impl OverlayManager {
    pub fn new(sink: Arc<dyn OverlaySink>) -> Self {
        Self {
            sink,
            labels: Vec::new(),
            ledger: DedupLedger::new(),
            next_id: 1,
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl.filter(|ttl| !ttl.is_zero());
        self
    }

    pub fn sink(&self) -> &Arc<dyn OverlaySink> {
        &self.sink
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn should_translate(&mut self, text: &str) -> bool {
        self.ledger.should_translate(text)
    }

    /// Shows a label for `entry`. A label already anchored at the same bounds
    /// is replaced.
    pub fn render(&mut self, entry: TranslationEntry) -> LabelId {
        if let Some(index) = self
            .labels
            .iter()
            .position(|label| label.entry.bounds == entry.bounds)
        {
            let replaced = self.labels.remove(index);
            self.sink.hide(replaced.id);
        }

        let id = self.next_id;
        self.next_id += 1;
        let label = Label {
            id,
            layout: LabelLayout::for_bounds(entry.bounds),
            entry,
            shown_at: Instant::now(),
        };
        debug!(
            id,
            bounds = %label.entry.bounds,
            font_px = label.layout.font_px,
            "label rendered"
        );
        self.sink.show(&label);
        self.labels.push(label);
        id
    }

    pub fn remove(&mut self, id: LabelId) -> bool {
        let Some(index) = self.labels.iter().position(|label| label.id == id) else {
            return false;
        };
        self.labels.remove(index);
        self.sink.hide(id);
        true
    }

    /// Hides every label and forgets every translated text.
    pub fn clear(&mut self) {
        for label in self.labels.drain(..) {
            self.sink.hide(label.id);
        }
        self.ledger.clear();
    }

    /// Removes labels shown for longer than the configured TTL.
    pub fn expire(&mut self, now: Instant) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let sink = &self.sink;
        let before = self.labels.len();
        self.labels.retain(|label| {
            let alive = now.saturating_duration_since(label.shown_at) < ttl;
            if !alive {
                sink.hide(label.id);
            }
            alive
        });
        let expired = before - self.labels.len();
        if expired > 0 {
            debug!(expired, "labels expired");
        }
        expired
    }
}
