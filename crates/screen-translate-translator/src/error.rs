use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("translation timed out after {after:?}")]
    Timeout { after: Duration },
    #[error("translator is not configured: {what} is missing")]
    NotConfigured { what: &'static str },
    #[error("invalid translator endpoint '{value}'")]
    InvalidEndpoint { value: String },
    #[error("translator request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translator returned status {code}: {body}")]
    Status { code: u16, body: String },
    #[error("failed to decode translator response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("translator returned no text")]
    EmptyResponse,
}

impl TranslateError {
    pub fn not_configured(what: &'static str) -> Self {
        Self::NotConfigured { what }
    }
}
