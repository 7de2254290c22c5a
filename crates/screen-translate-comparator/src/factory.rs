use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::comparators::{FrameComparator, SampledExactComparator, SampledLumaComparator};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum ComparatorKind {
    #[default]
    SampledExact,
    SampledLuma,
}

impl ComparatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparatorKind::SampledExact => "sampled-exact",
            ComparatorKind::SampledLuma => "sampled-luma",
        }
    }
}

impl fmt::Display for ComparatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ComparatorKindParseError(pub String);

impl fmt::Display for ComparatorKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown comparator '{}'", self.0)
    }
}

impl std::error::Error for ComparatorKindParseError {}

impl FromStr for ComparatorKind {
    type Err = ComparatorKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "sampled-exact" | "exact" => Ok(ComparatorKind::SampledExact),
            "sampled-luma" | "luma" => Ok(ComparatorKind::SampledLuma),
            _ => Err(ComparatorKindParseError(lower)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ComparatorSettings {
    pub kind: ComparatorKind,
    /// Sample every `stride`-th pixel in both axes.
    pub stride: usize,
    /// Luma tolerance; only read by [`ComparatorKind::SampledLuma`].
    pub luma_delta: u8,
}

impl Default for ComparatorSettings {
    fn default() -> Self {
        Self {
            kind: ComparatorKind::SampledExact,
            stride: 8,
            luma_delta: 6,
        }
    }
}

pub struct ComparatorFactory {
    settings: ComparatorSettings,
}

impl ComparatorFactory {
    pub fn new(settings: ComparatorSettings) -> Self {
        Self { settings }
    }

    pub fn build(&self) -> Arc<dyn FrameComparator> {
        match self.settings.kind {
            ComparatorKind::SampledExact => {
                Arc::new(SampledExactComparator::new(self.settings.stride))
            }
            ComparatorKind::SampledLuma => Arc::new(SampledLumaComparator::new(
                self.settings.stride,
                self.settings.luma_delta,
            )),
        }
    }
}
