pub mod backends;
pub mod config;
pub mod core;
pub mod frame_source;
pub mod session;
pub mod token;

pub use config::{Backend, Configuration};
pub use core::{CaptureSurface, DisplayMetrics, DynSurfaceProvider, RawImage, SurfaceProvider};
pub use frame_source::{FrameSource, FrameSourceConfig};
pub use screen_translate_types::{CaptureError, CaptureResult, Frame};
pub use session::{
    CaptureSessionLifecycle, CaptureSessionState, PlatformStopSignal, SessionEvent, SessionHandle,
    StopReason,
};
pub use token::CaptureToken;
