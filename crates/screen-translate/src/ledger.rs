use std::collections::HashSet;

/// Shortest source text, in characters, worth a translation call.
pub const MIN_TEXT_CHARS: usize = 2;

/// Source strings already sent for translation in the current overlay session.
///
/// Keys are the trimmed text, so whitespace-only differences between two
/// detections of the same block do not cause a second call.
#[derive(Debug, Default)]
pub struct DedupLedger {
    seen: HashSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `text` is long enough to translate at all, ignoring history.
    pub fn qualifies(text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty() && trimmed.chars().count() >= MIN_TEXT_CHARS
    }

    /// Test-and-set: returns true at most once per distinct text until
    /// [`DedupLedger::clear`].
    pub fn should_translate(&mut self, text: &str) -> bool {
        if !Self::qualifies(text) {
            return false;
        }
        self.seen.insert(text.trim().to_string())
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text.trim())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}
