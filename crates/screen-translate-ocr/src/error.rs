use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("text detection failed: {message}")]
    DetectionFailed { message: String },
    #[error("invalid regions: {reason}")]
    InvalidRegions { reason: String },
    #[error("failed to read regions: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse regions: {0}")]
    Parse(#[from] serde_json::Error),
}

impl DetectError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed {
            message: message.into(),
        }
    }

    pub fn invalid_regions(reason: impl Into<String>) -> Self {
        Self::InvalidRegions {
            reason: reason.into(),
        }
    }
}
