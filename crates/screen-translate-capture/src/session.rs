//! Capture session state machine.
//!
//! ```text
//! Idle --authorize--> Authorizing --grant--> Active --begin--> Capturing
//!                                              ^                  |
//!                                              +------ end -------+
//! any --stop--> Stopped --> Idle
//! ```
//!
//! The lifecycle owns the only capture surface, and at most one lifecycle per
//! display exists at a time. Handles are cheap clones that
//! name one session; once that session is stopped every handle and frame
//! source derived from it fails with [`CaptureError::SessionStopped`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, const_mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use screen_translate_types::{CaptureError, CaptureResult};

use crate::core::{CaptureSurface, DynSurfaceProvider};
use crate::frame_source::{FrameSource, FrameSourceConfig};
use crate::token::CaptureToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSessionState {
    Idle,
    Authorizing,
    Active,
    Capturing,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called by the owner of the session.
    Requested,
    /// The platform withdrew the capture authorization.
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Idle,
    Authorized { session: u64 },
    CaptureStarted { session: u64 },
    CaptureEnded { session: u64 },
    Stopped { session: u64, reason: StopReason },
}

impl SessionEvent {
    pub fn session(&self) -> Option<u64> {
        match *self {
            SessionEvent::Idle => None,
            SessionEvent::Authorized { session }
            | SessionEvent::CaptureStarted { session }
            | SessionEvent::CaptureEnded { session }
            | SessionEvent::Stopped { session, .. } => Some(session),
        }
    }

    /// Whether `session` is over: stopped itself or superseded by a newer one.
    pub fn ends(&self, session: u64) -> bool {
        match *self {
            SessionEvent::Idle => false,
            SessionEvent::Stopped { session: stopped, .. } => stopped >= session,
            other => other.session().is_some_and(|current| current > session),
        }
    }
}

struct LifecycleState {
    phase: CaptureSessionState,
    session: Option<u64>,
    surface: Option<Arc<dyn CaptureSurface>>,
}

/// Resource keys of displays currently owned by a lifecycle.
static CLAIMED_DISPLAYS: Mutex<Vec<usize>> = const_mutex(Vec::new());

fn claim_display(provider: &DynSurfaceProvider) -> CaptureResult<usize> {
    let key = provider.resource_key();
    let mut claimed = CLAIMED_DISPLAYS.lock();
    if claimed.contains(&key) {
        return Err(CaptureError::resource_unavailable(format!(
            "{} display is already owned by another capture lifecycle",
            provider.name()
        )));
    }
    claimed.push(key);
    Ok(key)
}

struct Shared {
    provider: DynSurfaceProvider,
    resource_key: usize,
    frame_config: FrameSourceConfig,
    state: Mutex<LifecycleState>,
    events: watch::Sender<SessionEvent>,
    next_session: AtomicU64,
}

impl Shared {
    fn stop(&self, only: Option<u64>, reason: StopReason) -> bool {
        let mut state = self.state.lock();
        let Some(current) = state.session else {
            return false;
        };
        if only.is_some_and(|session| session != current) {
            return false;
        }

        state.phase = CaptureSessionState::Stopped;
        if let Some(surface) = state.surface.take() {
            surface.release();
        }
        state.session = None;
        self.events.send_replace(SessionEvent::Stopped {
            session: current,
            reason,
        });
        state.phase = CaptureSessionState::Idle;
        info!(session = current, ?reason, "capture session stopped");
        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.stop(None, StopReason::Requested);
        CLAIMED_DISPLAYS.lock().retain(|key| *key != self.resource_key);
        debug!(provider = self.provider.name(), "capture display released");
    }
}

/// Owner of the capture resources; hands out at most one live session.
///
/// Construction claims the provider's display for as long as the lifecycle,
/// or any handle derived from it, is alive. A second lifecycle over the same
/// display fails with [`CaptureError::ResourceUnavailable`].
#[derive(Clone)]
pub struct CaptureSessionLifecycle {
    shared: Arc<Shared>,
}

impl fmt::Debug for CaptureSessionLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSessionLifecycle")
            .field("provider", &self.shared.provider.name())
            .field("state", &self.state())
            .finish()
    }
}

impl CaptureSessionLifecycle {
    pub fn new(provider: DynSurfaceProvider) -> CaptureResult<Self> {
        Self::with_frame_config(provider, FrameSourceConfig::default())
    }

    pub fn with_frame_config(
        provider: DynSurfaceProvider,
        frame_config: FrameSourceConfig,
    ) -> CaptureResult<Self> {
        let resource_key = claim_display(&provider)?;
        let (events, _) = watch::channel(SessionEvent::Idle);
        Ok(Self {
            shared: Arc::new(Shared {
                provider,
                resource_key,
                frame_config,
                state: Mutex::new(LifecycleState {
                    phase: CaptureSessionState::Idle,
                    session: None,
                    surface: None,
                }),
                events,
                next_session: AtomicU64::new(1),
            }),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.shared.provider.name()
    }

    pub fn state(&self) -> CaptureSessionState {
        self.shared.state.lock().phase
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn current(&self) -> Option<SessionHandle> {
        let state = self.shared.state.lock();
        state.session.map(|id| SessionHandle {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Spends `token` to open a session. While a session is live the token is
    /// ignored and the live session is returned.
    pub fn authorize(&self, token: CaptureToken) -> CaptureResult<SessionHandle> {
        let mut state = self.shared.state.lock();
        if let Some(id) = state.session {
            debug!(session = id, "capture session already active; reusing it");
            return Ok(SessionHandle {
                id,
                shared: Arc::clone(&self.shared),
            });
        }

        state.phase = CaptureSessionState::Authorizing;
        if let Err(err) = validate_token(&self.shared.provider, &token) {
            state.phase = CaptureSessionState::Idle;
            warn!(provider = self.shared.provider.name(), "capture authorization failed: {err}");
            return Err(err);
        }

        let id = self.shared.next_session.fetch_add(1, Ordering::SeqCst);
        state.session = Some(id);
        state.phase = CaptureSessionState::Active;
        self.shared
            .events
            .send_replace(SessionEvent::Authorized { session: id });
        info!(session = id, provider = self.shared.provider.name(), "capture session authorized");
        Ok(SessionHandle {
            id,
            shared: Arc::clone(&self.shared),
        })
    }

    /// Stops whichever session is live. Safe to call repeatedly.
    pub fn stop(&self) {
        self.shared.stop(None, StopReason::Requested);
    }
}

fn validate_token(provider: &DynSurfaceProvider, token: &CaptureToken) -> CaptureResult<()> {
    if token.grant().trim().is_empty() {
        return Err(CaptureError::permission_denied("capture token is empty"));
    }
    if token.is_expired() {
        return Err(CaptureError::permission_denied("capture token has expired"));
    }
    provider.grant(token).map_err(|err| match err {
        CaptureError::PermissionDenied { .. } => err,
        other => CaptureError::permission_denied(other.to_string()),
    })
}

/// Reference to one authorized session.
#[derive(Clone)]
pub struct SessionHandle {
    id: u64,
    shared: Arc<Shared>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("live", &self.is_live())
            .finish()
    }
}

impl SessionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> CaptureSessionState {
        let state = self.shared.state.lock();
        if state.session == Some(self.id) {
            state.phase
        } else {
            CaptureSessionState::Idle
        }
    }

    pub fn is_live(&self) -> bool {
        self.shared.state.lock().session == Some(self.id)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Starts capturing. Allocates the surface on first use; later calls while
    /// capturing return a source over the same surface.
    pub fn begin(&self) -> CaptureResult<FrameSource> {
        let mut state = self.shared.state.lock();
        if state.session != Some(self.id) {
            return Err(CaptureError::SessionStopped { session: self.id });
        }

        match state.phase {
            CaptureSessionState::Capturing => {
                if let Some(surface) = state.surface.clone() {
                    debug!(session = self.id, "capture already running; reusing surface");
                    return Ok(self.frame_source(surface));
                }
            }
            CaptureSessionState::Active => {}
            _ => return Err(CaptureError::SessionStopped { session: self.id }),
        }

        let surface = match state.surface.clone() {
            Some(surface) => surface,
            None => {
                let provider = &self.shared.provider;
                let metrics = provider.display();
                let surface = provider.allocate(metrics).map_err(|err| match err {
                    CaptureError::ResourceUnavailable { .. } => err,
                    other => CaptureError::resource_unavailable(other.to_string()),
                })?;
                info!(
                    session = self.id,
                    width = metrics.width,
                    height = metrics.height,
                    "capture surface allocated"
                );
                state.surface = Some(Arc::clone(&surface));
                surface
            }
        };

        state.phase = CaptureSessionState::Capturing;
        self.shared
            .events
            .send_replace(SessionEvent::CaptureStarted { session: self.id });
        Ok(self.frame_source(surface))
    }

    /// Leaves the capturing sub-state; the surface stays allocated until stop.
    pub fn end(&self) {
        let mut state = self.shared.state.lock();
        if state.session == Some(self.id) && state.phase == CaptureSessionState::Capturing {
            state.phase = CaptureSessionState::Active;
            self.shared
                .events
                .send_replace(SessionEvent::CaptureEnded { session: self.id });
        }
    }

    /// Stops this session if it is still the live one. Idempotent.
    pub fn stop(&self) {
        self.shared.stop(Some(self.id), StopReason::Requested);
    }

    /// Signal the platform glue fires when it withdraws this authorization.
    pub fn platform_signal(&self) -> PlatformStopSignal {
        PlatformStopSignal {
            session: self.id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn frame_source(&self, surface: Arc<dyn CaptureSurface>) -> FrameSource {
        FrameSource::new(
            self.id,
            surface,
            self.shared.events.subscribe(),
            self.shared.frame_config,
        )
    }
}

/// Bridges platform stop callbacks into the same path as [`SessionHandle::stop`].
#[derive(Clone)]
pub struct PlatformStopSignal {
    session: u64,
    shared: Weak<Shared>,
}

impl PlatformStopSignal {
    pub fn fire(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.stop(Some(self.session), StopReason::Revoked);
        }
    }
}
