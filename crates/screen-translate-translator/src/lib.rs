//! Translation backends consumed by the scan pipeline.

mod chat;
mod error;

use async_trait::async_trait;

pub use chat::{
    ChatTranslator, ChatTranslatorConfig, DEFAULT_BASE_URL, DEFAULT_MODEL,
    DEFAULT_TARGET_LANGUAGE, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT,
};
pub use error::TranslateError;

/// Maps source text to translated text.
///
/// Implementations must be safe to call concurrently; the pipeline may keep
/// several requests in flight and drops the futures of cancelled cycles.
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(&self, text: &str) -> Result<String, TranslateError>;
}
