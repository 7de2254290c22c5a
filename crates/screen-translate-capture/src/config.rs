use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use screen_translate_types::{CaptureError, CaptureResult};

use crate::backends::synthetic::SyntheticDisplay;
use crate::core::{DisplayMetrics, DynSurfaceProvider};
use crate::frame_source::FrameSourceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Synthetic,
    Still,
}

impl FromStr for Backend {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "synthetic" => Ok(Backend::Synthetic),
            "still" => Ok(Backend::Still),
            other => Err(CaptureError::configuration(format!(
                "unknown backend '{other}'"
            ))),
        }
    }
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Synthetic => "synthetic",
            Backend::Still => "still",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn compiled_backends() -> Vec<Backend> {
    let mut backends = Vec::new();
    #[cfg(feature = "backend-still")]
    {
        backends.push(Backend::Still);
    }
    backends.push(Backend::Synthetic);
    backends
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub backend: Backend,
    pub input: Option<PathBuf>,
    /// Size of the synthetic display; ignored by file-backed backends.
    pub display: DisplayMetrics,
    pub frame: FrameSourceConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            backend: Backend::Synthetic,
            input: None,
            display: DisplayMetrics::new(1280, 720),
            frame: FrameSourceConfig::default(),
        }
    }
}

impl Configuration {
    pub fn from_env() -> CaptureResult<Self> {
        let mut config = Configuration::default();
        if let Ok(path) = env::var("SCRTR_INPUT") {
            config.input = Some(PathBuf::from(path));
            if cfg!(feature = "backend-still") {
                config.backend = Backend::Still;
            }
        }
        if let Ok(backend) = env::var("SCRTR_BACKEND") {
            config.backend = Backend::from_str(&backend)?;
        }
        Ok(config)
    }

    pub fn available_backends() -> Vec<Backend> {
        compiled_backends()
    }

    pub fn create_provider(&self) -> CaptureResult<DynSurfaceProvider> {
        match self.backend {
            Backend::Synthetic => Ok(Arc::new(SyntheticDisplay::with_test_pattern(
                self.display.width,
                self.display.height,
            ))),
            Backend::Still => {
                #[cfg(feature = "backend-still")]
                {
                    let path = self.input.clone().ok_or_else(|| {
                        CaptureError::configuration("still backend requires SCRTR_INPUT to be set")
                    })?;
                    crate::backends::still::boxed_still(path)
                }
                #[cfg(not(feature = "backend-still"))]
                {
                    Err(CaptureError::unsupported("still"))
                }
            }
        }
    }
}
