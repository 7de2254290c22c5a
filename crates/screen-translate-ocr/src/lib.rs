mod engine;
mod error;
mod preprocess;
mod regions;
mod request;

pub use engine::{NoopDetector, TextDetector};
pub use error::DetectError;
pub use preprocess::{DEFAULT_CONTRAST, PreprocessingDetector, enhance};
pub use regions::JsonRegionsDetector;
pub use request::DetectRequest;
pub use screen_translate_types::{LanguageHint, TextRegion};
