use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use screen_translate_capture::{
    CaptureError, CaptureSessionLifecycle, CaptureToken, Configuration, SessionHandle,
};
use screen_translate_comparator::{ChangeGate, ComparatorFactory};
use screen_translate_ocr::{
    DetectError, JsonRegionsDetector, NoopDetector, PreprocessingDetector, TextDetector,
};
use screen_translate_translator::{ChatTranslator, TranslateError};

use crate::overlay::{OverlayManager, OverlaySink};
use crate::pipeline::{PipelineConfig, PipelineController};
use crate::scan_loop::{ScanCommand, ScanLoop, ScanLoopConfig, ScanSummary, ScanTrigger, TriggerError};
use crate::settings::{ConfigError, EffectiveSettings, ScanSettings};

const CLI_GRANT: &str = "screen-translate-cli";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Detect(#[from] DetectError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("scan loop task failed: {0}")]
    Join(#[from] JoinError),
}

pub fn build_detector(settings: &EffectiveSettings) -> Result<Arc<dyn TextDetector>, DetectError> {
    let preprocess = settings.scan.preprocess;
    let detector: Arc<dyn TextDetector> = match settings.regions.clone() {
        Some(path) if preprocess => {
            Arc::new(PreprocessingDetector::new(JsonRegionsDetector::open(path)?))
        }
        Some(path) => Arc::new(JsonRegionsDetector::open(path)?),
        None if preprocess => Arc::new(PreprocessingDetector::new(NoopDetector)),
        None => Arc::new(NoopDetector),
    };
    detector.warm_up()?;
    Ok(detector)
}

pub fn build_gate(scan: &ScanSettings) -> ChangeGate {
    let comparator = ComparatorFactory::new(scan.comparator).build();
    ChangeGate::new(comparator, scan.similarity_threshold)
}

/// Asks the configured translator endpoint which models it serves.
pub async fn list_models(settings: &EffectiveSettings) -> Result<Vec<String>, AppError> {
    let translator = ChatTranslator::new(settings.translator.clone())?;
    let models = translator.list_models().await?;
    info!(count = models.len(), "translator models listed");
    Ok(models)
}

/// Everything `run` needs besides the resolved settings.
pub struct ExecutionPlan {
    pub settings: EffectiveSettings,
    pub max_cycles: Option<u64>,
    pub sink: Arc<dyn OverlaySink>,
    /// Read scan/clear/language/quit commands from stdin.
    pub interactive: bool,
}

/// Authorizes a session, runs the scan loop until it ends or Ctrl-C, then
/// stops the session.
pub async fn run(plan: ExecutionPlan) -> Result<ScanSummary, AppError> {
    let ExecutionPlan {
        settings,
        max_cycles,
        sink,
        interactive,
    } = plan;

    let backend = settings.capture.backend;
    if !Configuration::available_backends().contains(&backend) {
        return Err(CaptureError::unsupported(backend.as_str()).into());
    }

    let detector = build_detector(&settings)?;
    let translator = Arc::new(ChatTranslator::new(settings.translator.clone())?);
    if settings.translator.api_key.is_empty() {
        warn!("no translator api key configured; every translation will be dropped");
    }

    let provider_started = Instant::now();
    let provider = settings.capture.create_provider()?;
    info!(
        backend = %backend,
        elapsed = ?provider_started.elapsed(),
        "capture backend initialized"
    );

    let lifecycle = CaptureSessionLifecycle::with_frame_config(provider, settings.capture.frame)?;
    let session = lifecycle.authorize(CaptureToken::new(CLI_GRANT))?;
    let source = match session.begin() {
        Ok(source) => source,
        Err(err) => {
            session.stop();
            return Err(err.into());
        }
    };

    let overlay = OverlayManager::new(sink).with_ttl(settings.scan.label_ttl);
    let controller = PipelineController::new(
        source,
        build_gate(&settings.scan),
        detector,
        translator,
        overlay,
        PipelineConfig {
            language: settings.language,
            indicator: settings.scan.indicator,
            concurrency: settings.scan.concurrency,
        },
    );
    let loop_config = ScanLoopConfig {
        interval: settings.scan.interval,
        max_cycles,
        ..ScanLoopConfig::default()
    };
    let (trigger, mut handle) = ScanLoop::new(controller, loop_config).spawn();

    // The first scan runs right away; later ones come from the timer or stdin.
    if let Err(err) = trigger.scan() {
        debug!(error = %err, "initial trigger refused");
    }
    if interactive {
        spawn_command_reader(trigger, session.clone());
    } else {
        drop(trigger);
    }

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received; stopping capture session");
            session.stop();
            handle.await
        }
    };
    let (controller, summary) = joined?;
    drop(controller);
    session.stop();
    Ok(summary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Loop(ScanCommand),
    Quit,
}

/// Stdin lines act as the hotkey: empty or `s` scans, `c` clears, `l` switches
/// the source language, `q` quits.
fn parse_command(line: &str) -> Option<ConsoleCommand> {
    let command = match line.trim() {
        "" | "s" | "scan" => ConsoleCommand::Loop(ScanCommand::Scan),
        "c" | "clear" => ConsoleCommand::Loop(ScanCommand::Clear),
        "l" | "lang" => ConsoleCommand::Loop(ScanCommand::ToggleLanguage),
        "q" | "quit" => ConsoleCommand::Quit,
        _ => return None,
    };
    Some(command)
}

fn spawn_command_reader(trigger: ScanTrigger, session: SessionHandle) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match parse_command(&line) {
                Some(ConsoleCommand::Loop(command)) => command,
                Some(ConsoleCommand::Quit) => {
                    session.stop();
                    break;
                }
                None => {
                    warn!(input = line.trim(), "unknown command; use s, c, l or q");
                    continue;
                }
            };
            match trigger.try_trigger(command) {
                Ok(()) => {}
                Err(TriggerError::Busy) => debug!("scan in progress; trigger ignored"),
                Err(TriggerError::Closed) => break,
            }
        }
    });
}
