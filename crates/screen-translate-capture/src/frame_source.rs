use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

use screen_translate_types::{CaptureError, CaptureResult, Frame};

use crate::core::CaptureSurface;
use crate::session::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSourceConfig {
    /// Delay before the first read; the mirror fills asynchronously.
    pub settle: Duration,
    /// Extra time to keep polling when the surface is still empty.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for FrameSourceConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(150),
            timeout: Duration::from_millis(150),
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Pulls single frames from the surface of one capture session.
#[derive(Clone)]
pub struct FrameSource {
    session: u64,
    surface: Arc<dyn CaptureSurface>,
    events: watch::Receiver<SessionEvent>,
    config: FrameSourceConfig,
}

impl fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSource")
            .field("session", &self.session)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FrameSource {
    pub(crate) fn new(
        session: u64,
        surface: Arc<dyn CaptureSurface>,
        events: watch::Receiver<SessionEvent>,
        config: FrameSourceConfig,
    ) -> Self {
        Self {
            session,
            surface,
            events,
            config,
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn config(&self) -> FrameSourceConfig {
        self.config
    }

    pub fn is_stopped(&self) -> bool {
        self.events.borrow().ends(self.session)
    }

    /// Lifecycle events of the owning session's lifecycle.
    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.events.clone()
    }

    /// Waits for the surface to settle, then returns the newest frame with row
    /// padding removed. Gives up with `NoFrameAvailable` after the bounded wait.
    pub async fn capture(&self) -> CaptureResult<Frame> {
        self.ensure_live()?;
        let started = Instant::now();
        if !self.config.settle.is_zero() {
            sleep(self.config.settle).await;
        }

        let deadline = Instant::now() + self.config.timeout;
        loop {
            self.ensure_live()?;
            if let Some(raw) = self.surface.acquire_latest() {
                let frame = raw.into_frame(Instant::now())?;
                debug!(
                    session = self.session,
                    width = frame.width(),
                    height = frame.height(),
                    waited = ?started.elapsed(),
                    "frame captured"
                );
                return Ok(frame);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(CaptureError::NoFrameAvailable {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    fn ensure_live(&self) -> CaptureResult<()> {
        if self.is_stopped() {
            Err(CaptureError::SessionStopped {
                session: self.session,
            })
        } else {
            Ok(())
        }
    }
}
