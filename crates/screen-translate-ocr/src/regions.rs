use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use screen_translate_types::{LanguageHint, Rect, TextRegion};

use crate::engine::TextDetector;
use crate::error::DetectError;
use crate::request::DetectRequest;

/// One entry of a regions file.
#[derive(Debug, Clone, Deserialize)]
struct RegionSpec {
    text: String,
    bounds: Option<Rect>,
    /// Restricts the entry to one language; absent means any.
    #[serde(default)]
    language: Option<LanguageHint>,
}

enum Source {
    File(PathBuf),
    Inline(Vec<RegionSpec>),
}

/// Detector that replays text regions described in JSON.
///
/// File-backed detectors re-read the file on every call, so editing it
/// changes what the next scan finds. Entries without bounds are skipped and
/// bounds are clipped to the frame.
pub struct JsonRegionsDetector {
    source: Source,
}

impl JsonRegionsDetector {
    /// Validates the file once up front; later read errors surface from `detect`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DetectError> {
        let path = path.into();
        read_specs(&path)?;
        Ok(Self {
            source: Source::File(path),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, DetectError> {
        let specs: Vec<RegionSpec> = serde_json::from_str(json)?;
        validate(&specs)?;
        Ok(Self {
            source: Source::Inline(specs),
        })
    }

    fn specs(&self) -> Result<Vec<RegionSpec>, DetectError> {
        match &self.source {
            Source::File(path) => read_specs(path),
            Source::Inline(specs) => Ok(specs.clone()),
        }
    }
}

fn read_specs(path: &Path) -> Result<Vec<RegionSpec>, DetectError> {
    let raw = fs::read_to_string(path)?;
    let specs: Vec<RegionSpec> = serde_json::from_str(&raw)?;
    validate(&specs)?;
    Ok(specs)
}

/// Rejects entries whose right or bottom edge lies before the left or top.
fn validate(specs: &[RegionSpec]) -> Result<(), DetectError> {
    for (index, spec) in specs.iter().enumerate() {
        let Some(bounds) = spec.bounds else {
            continue;
        };
        if bounds.right < bounds.left || bounds.bottom < bounds.top {
            return Err(DetectError::invalid_regions(format!(
                "entry {index} ('{}') has inverted bounds {bounds}",
                spec.text
            )));
        }
    }
    Ok(())
}

impl TextDetector for JsonRegionsDetector {
    fn name(&self) -> &'static str {
        "json-regions"
    }

    fn detect(&self, request: &DetectRequest<'_>) -> Result<Vec<TextRegion>, DetectError> {
        let frame = request.frame();
        let frame_rect = Rect::from_size(0, 0, frame.width(), frame.height());
        let specs = self.specs().map_err(|err| match err {
            DetectError::InvalidRegions { .. } => err,
            other => DetectError::failed(other.to_string()),
        })?;

        let mut regions = Vec::with_capacity(specs.len());
        for spec in specs {
            if spec
                .language
                .is_some_and(|language| language != request.language())
            {
                continue;
            }
            let Some(bounds) = spec.bounds else {
                debug!(text = %spec.text, "region without bounds skipped");
                continue;
            };
            let clipped = clip(bounds, frame_rect);
            if clipped.is_empty() {
                warn!(text = %spec.text, %bounds, "region outside frame skipped");
                continue;
            }
            regions.push(TextRegion::new(spec.text, clipped));
        }
        Ok(regions)
    }
}

fn clip(bounds: Rect, frame: Rect) -> Rect {
    Rect::new(
        bounds.left.max(frame.left),
        bounds.top.max(frame.top),
        bounds.right.min(frame.right),
        bounds.bottom.min(frame.bottom),
    )
}
