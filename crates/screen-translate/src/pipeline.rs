use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{AbortHandle, Abortable, Aborted};
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use screen_translate_capture::{CaptureError, FrameSource, SessionEvent};
use screen_translate_comparator::ChangeGate;
use screen_translate_ocr::{DetectError, DetectRequest, TextDetector};
use screen_translate_translator::{TranslateError, Translator};
use screen_translate_types::{LanguageHint, TextRegion, TranslationEntry};

use crate::overlay::OverlayManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Triggered,
    Capturing,
    Gating,
    Detecting,
    Translating { regions: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub language: LanguageHint,
    /// How long the scanning indicator shows before capture; zero disables it.
    pub indicator: Duration,
    /// Translation calls allowed in flight at once within a cycle.
    pub concurrency: NonZeroUsize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: LanguageHint::default(),
            indicator: Duration::ZERO,
            concurrency: NonZeroUsize::MIN,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Regions returned by the detector.
    pub regions: usize,
    /// Regions dropped before translation: blank, too short or already seen.
    pub skipped: usize,
    /// Regions translated and rendered.
    pub rendered: usize,
    /// Regions whose translation failed or came back blank.
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The frame matched the baseline; nothing was detected or translated.
    Unchanged,
    Completed(CycleReport),
    /// The session stopped mid-cycle; overlays were cleared.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("detection failed: {0}")]
    Detection(#[from] DetectError),
}

impl CycleError {
    /// Whether the session is gone and further triggers are pointless.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, CycleError::Capture(err) if err.is_session_fatal())
    }
}

type TranslationJoin = Result<Result<Result<String, TranslateError>, Aborted>, JoinError>;

/// Runs scan cycles for one capture session: capture, gate, detect, dedup,
/// translate, render.
pub struct PipelineController {
    source: FrameSource,
    events: watch::Receiver<SessionEvent>,
    gate: ChangeGate,
    detector: Arc<dyn TextDetector>,
    translator: Arc<dyn Translator>,
    overlay: OverlayManager,
    config: PipelineConfig,
    phase: watch::Sender<CyclePhase>,
}

impl PipelineController {
    pub fn new(
        source: FrameSource,
        gate: ChangeGate,
        detector: Arc<dyn TextDetector>,
        translator: Arc<dyn Translator>,
        overlay: OverlayManager,
        config: PipelineConfig,
    ) -> Self {
        let events = source.subscribe();
        let (phase, _) = watch::channel(CyclePhase::Idle);
        Self {
            source,
            events,
            gate,
            detector,
            translator,
            overlay,
            config,
            phase,
        }
    }

    pub fn session(&self) -> u64 {
        self.source.session()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<CyclePhase> {
        self.phase.subscribe()
    }

    pub fn overlay(&self) -> &OverlayManager {
        &self.overlay
    }

    pub fn is_stopped(&self) -> bool {
        self.source.is_stopped()
    }

    pub fn set_language(&mut self, language: LanguageHint) {
        self.config.language = language;
    }

    /// Switches to the other source language and clears, so the next trigger
    /// re-detects the current screen in that language.
    pub fn toggle_language(&mut self) -> LanguageHint {
        let language = self.config.language.toggled();
        self.set_language(language);
        self.clear();
        info!(session = self.session(), %language, "source language switched");
        language
    }

    /// User-requested clear: labels, ledger and gate baseline all reset, so the
    /// next trigger processes the screen even if it has not changed.
    pub fn clear(&mut self) {
        self.overlay.clear();
        self.gate.reset();
        debug!(session = self.session(), "overlays cleared");
    }

    /// Moves the controller to a newly started session.
    pub fn rebind(&mut self, source: FrameSource) {
        self.events = source.subscribe();
        self.source = source;
        self.clear();
        info!(session = self.session(), "pipeline bound to new capture session");
    }

    pub fn expire_labels(&mut self, now: Instant) -> usize {
        self.overlay.expire(now)
    }

    /// Cleanup after the session stopped. Idempotent.
    pub fn shutdown(&mut self) {
        self.overlay.clear();
        self.gate.reset();
        self.set_phase(CyclePhase::Idle);
    }

    /// Resolves once the bound session has been stopped or superseded.
    pub async fn stopped(&mut self) {
        session_ended(&mut self.events, self.source.session()).await;
    }

    /// Runs one scan cycle to completion, abort or cancellation.
    pub async fn scan(&mut self) -> Result<CycleOutcome, CycleError> {
        let session = self.source.session();
        if self.source.is_stopped() {
            self.shutdown();
            return Err(CaptureError::SessionStopped { session }.into());
        }

        let started = Instant::now();
        self.set_phase(CyclePhase::Triggered);
        let result = self.run_cycle(session).await;
        self.set_phase(CyclePhase::Idle);

        match &result {
            Ok(CycleOutcome::Completed(report)) => info!(
                session,
                regions = report.regions,
                skipped = report.skipped,
                rendered = report.rendered,
                failed = report.failed,
                elapsed = ?started.elapsed(),
                "scan cycle completed"
            ),
            Ok(CycleOutcome::Unchanged) => debug!(session, "screen unchanged; cycle skipped"),
            Ok(CycleOutcome::Cancelled) => info!(session, "scan cycle cancelled by session stop"),
            Err(err) => warn!(session, error = %err, "scan cycle aborted"),
        }
        result
    }

    async fn run_cycle(&mut self, session: u64) -> Result<CycleOutcome, CycleError> {
        if !self.config.indicator.is_zero() {
            let sink = Arc::clone(self.overlay.sink());
            sink.show_scan_indicator();
            let stopped = tokio::select! {
                _ = sleep(self.config.indicator) => false,
                _ = session_ended(&mut self.events, session) => true,
            };
            sink.hide_scan_indicator();
            if stopped {
                return Ok(self.cancel());
            }
        }

        self.set_phase(CyclePhase::Capturing);
        let captured = tokio::select! {
            captured = self.source.capture() => captured,
            _ = session_ended(&mut self.events, session) => return Ok(self.cancel()),
        };
        let frame = match captured {
            Ok(frame) => frame,
            Err(CaptureError::SessionStopped { .. }) => return Ok(self.cancel()),
            Err(err) => return Err(err.into()),
        };

        self.set_phase(CyclePhase::Gating);
        if self.gate.is_unchanged(&frame) {
            return Ok(CycleOutcome::Unchanged);
        }

        self.overlay.clear();
        self.set_phase(CyclePhase::Detecting);
        let detector = Arc::clone(&self.detector);
        let language = self.config.language;
        let detect_frame = frame.clone();
        let detection = tokio::task::spawn_blocking(move || {
            detector.detect(&DetectRequest::new(&detect_frame, language))
        });
        let regions = tokio::select! {
            joined = detection => match joined {
                Ok(result) => result?,
                Err(err) => {
                    return Err(DetectError::failed(format!("detector task failed: {err}")).into());
                }
            },
            _ = session_ended(&mut self.events, session) => return Ok(self.cancel()),
        };
        debug!(
            session,
            detector = self.detector.name(),
            regions = regions.len(),
            "text detected"
        );
        self.gate.accept(frame);

        match self.translate_regions(session, regions).await {
            Some(report) => Ok(CycleOutcome::Completed(report)),
            None => Ok(self.cancel()),
        }
    }

    /// Dedups in detector order, then translates with bounded concurrency and
    /// renders results in that same order. `None` when the session stopped.
    async fn translate_regions(
        &mut self,
        session: u64,
        regions: Vec<TextRegion>,
    ) -> Option<CycleReport> {
        let mut report = CycleReport {
            regions: regions.len(),
            ..CycleReport::default()
        };

        let mut handles = Vec::new();
        let mut jobs = Vec::new();
        for region in regions {
            if !self.overlay.should_translate(&region.text) {
                report.skipped += 1;
                continue;
            }
            let (handle, registration) = AbortHandle::new_pair();
            handles.push(handle);
            jobs.push((region, registration));
        }
        self.set_phase(CyclePhase::Translating {
            regions: jobs.len(),
        });
        if jobs.is_empty() {
            return Some(report);
        }

        let translator = Arc::clone(&self.translator);
        let mut results = stream::iter(jobs)
            .map(move |(region, registration)| {
                let translator = Arc::clone(&translator);
                let text = region.text.trim().to_string();
                let task = tokio::spawn(Abortable::new(
                    async move { translator.translate(&text).await },
                    registration,
                ));
                async move {
                    let joined: TranslationJoin = task.await;
                    (region, joined)
                }
            })
            .buffered(self.config.concurrency.get());

        loop {
            // A stop that lands with a finished translation wins; nothing renders after it.
            let next = tokio::select! {
                biased;
                _ = session_ended(&mut self.events, session) => {
                    for handle in &handles {
                        handle.abort();
                    }
                    return None;
                }
                next = results.next() => next,
            };
            let Some((region, joined)) = next else {
                break;
            };
            match joined {
                Ok(Ok(Ok(translated))) if !translated.trim().is_empty() => {
                    let translated = translated.trim().to_string();
                    self.overlay.render(TranslationEntry::new(
                        region.text,
                        translated,
                        region.bounds,
                    ));
                    report.rendered += 1;
                }
                Ok(Ok(Ok(_))) => {
                    warn!(session, text = %region.text, "blank translation dropped");
                    report.failed += 1;
                }
                Ok(Ok(Err(err))) => {
                    warn!(session, text = %region.text, error = %err, "translation failed; region dropped");
                    report.failed += 1;
                }
                Ok(Err(Aborted)) => {
                    report.failed += 1;
                }
                Err(err) => {
                    warn!(session, text = %region.text, error = %err, "translation task failed");
                    report.failed += 1;
                }
            }
        }
        Some(report)
    }

    fn cancel(&mut self) -> CycleOutcome {
        self.shutdown();
        CycleOutcome::Cancelled
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.phase.send_replace(phase);
    }
}

async fn session_ended(events: &mut watch::Receiver<SessionEvent>, session: u64) {
    loop {
        if events.borrow_and_update().ends(session) {
            return;
        }
        if events.changed().await.is_err() {
            if events.borrow().ends(session) {
                return;
            }
            // Lifecycle dropped without stopping; nothing can end the session now.
            std::future::pending::<()>().await;
        }
    }
}
