//! Shared domain models for the screen-translate workspace.
//!
//! This crate centralizes the lightweight data structures passed between the
//! capture, comparator, detector, translator, and pipeline crates. Keep it
//! backend-agnostic so every crate can depend on it without pulling platform
//! SDKs or network stacks.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per pixel of every [`Frame`] (RGBA, 8 bits per channel).
pub const BYTES_PER_PIXEL: usize = 4;

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Immutable RGBA pixel buffer captured from the display.
///
/// Rows are tightly packed: any row padding reported by the capture surface
/// has already been cropped away, so `data().len() == width * height * 4`.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    captured_at: Instant,
    data: Arc<[u8]>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Frame {
    pub fn from_rgba(
        width: u32,
        height: u32,
        captured_at: Instant,
        data: Vec<u8>,
    ) -> CaptureResult<Self> {
        let required = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(BYTES_PER_PIXEL))
            .ok_or_else(|| CaptureError::InvalidFrame {
                reason: "calculated RGBA length overflowed".into(),
            })?;
        if data.len() != required {
            return Err(CaptureError::InvalidFrame {
                reason: format!(
                    "RGBA buffer holds {} bytes, expected exactly {}",
                    data.len(),
                    required
                ),
            });
        }
        Ok(Self {
            width,
            height,
            captured_at,
            data: Arc::from(data.into_boxed_slice()),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Returns the RGBA value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(offset..offset + BYTES_PER_PIXEL)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Axis-aligned rectangle in frame pixel coordinates (right/bottom exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn from_size(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            right: left.saturating_add(width as i32),
            bottom: top.saturating_add(height as i32),
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@({},{})",
            self.width(),
            self.height(),
            self.left,
            self.top
        )
    }
}

/// A block of source text located by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    pub bounds: Rect,
}

impl TextRegion {
    pub fn new(text: impl Into<String>, bounds: Rect) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

/// A successful translation waiting to be (or being) displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationEntry {
    pub source_text: String,
    pub translated_text: String,
    pub bounds: Rect,
    pub created_at: Instant,
}

impl TranslationEntry {
    pub fn new(
        source_text: impl Into<String>,
        translated_text: impl Into<String>,
        bounds: Rect,
    ) -> Self {
        Self {
            source_text: source_text.into(),
            translated_text: translated_text.into(),
            bounds,
            created_at: Instant::now(),
        }
    }
}

/// Source language the detector should expect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LanguageHint {
    #[default]
    #[serde(rename = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    Korean,
}

impl LanguageHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageHint::Japanese => "ja",
            LanguageHint::Korean => "ko",
        }
    }

    /// The other supported language; mirrors the overlay menu toggle.
    pub fn toggled(self) -> Self {
        match self {
            LanguageHint::Japanese => LanguageHint::Korean,
            LanguageHint::Korean => LanguageHint::Japanese,
        }
    }
}

impl fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageHint {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ja" | "jp" | "japanese" => Ok(LanguageHint::Japanese),
            "ko" | "kr" | "korean" => Ok(LanguageHint::Korean),
            other => Err(CaptureError::configuration(format!(
                "unknown language '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("capture resources unavailable: {reason}")]
    ResourceUnavailable { reason: String },

    #[error("no frame became available within {waited_ms}ms")]
    NoFrameAvailable { waited_ms: u64 },

    #[error("capture session {session} has been stopped")]
    SessionStopped { session: u64 },

    #[error("backend {backend} is not supported in this build")]
    Unsupported { backend: &'static str },

    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid frame: {reason}")]
    InvalidFrame { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    pub fn resource_unavailable(reason: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            reason: reason.into(),
        }
    }

    pub fn unsupported(backend: &'static str) -> Self {
        Self::Unsupported { backend }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Session-level failures end the session and require a new authorization.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::PermissionDenied { .. }
                | CaptureError::ResourceUnavailable { .. }
                | CaptureError::SessionStopped { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        let err = Frame::from_rgba(2, 2, Instant::now(), vec![0; 15]).unwrap_err();
        assert!(matches!(err, CaptureError::InvalidFrame { .. }));
    }

    #[test]
    fn frame_pixel_reads_row_major() {
        let mut data = vec![0u8; 3 * 2 * 4];
        data[20..24].copy_from_slice(&[9, 8, 7, 6]);
        let frame = Frame::from_rgba(3, 2, Instant::now(), data).unwrap();
        assert_eq!(frame.pixel(2, 1), Some([9, 8, 7, 6]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn rect_dimensions_never_negative() {
        let rect = Rect::new(10, 10, 4, 30);
        assert_eq!(rect.width(), 0);
        assert_eq!(rect.height(), 20);
        assert!(rect.is_empty());
        assert_eq!(Rect::from_size(1, 2, 3, 4), Rect::new(1, 2, 4, 6));
    }

    #[test]
    fn language_hint_parses_aliases() {
        assert_eq!("JA".parse::<LanguageHint>().unwrap(), LanguageHint::Japanese);
        assert_eq!("korean".parse::<LanguageHint>().unwrap(), LanguageHint::Korean);
        assert!("fr".parse::<LanguageHint>().is_err());
        assert_eq!(LanguageHint::Japanese.toggled(), LanguageHint::Korean);
    }
}
