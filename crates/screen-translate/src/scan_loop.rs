use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::pipeline::{CycleError, CycleOutcome, PipelineController};

const TRIGGER_CAPACITY: usize = 1;
const DEFAULT_EXPIRY_TICK: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanCommand {
    Scan,
    Clear,
    ToggleLanguage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("a scan cycle is already running")]
    Busy,
    #[error("the scan loop has exited")]
    Closed,
}

/// Sends commands to a running [`ScanLoop`]. Commands are refused, not
/// queued, while a cycle is in flight.
#[derive(Clone)]
pub struct ScanTrigger {
    tx: mpsc::Sender<ScanCommand>,
    busy: Arc<AtomicBool>,
}

impl ScanTrigger {
    pub fn try_trigger(&self, command: ScanCommand) -> Result<(), TriggerError> {
        if self.busy.load(Ordering::SeqCst) {
            return Err(TriggerError::Busy);
        }
        self.tx.try_send(command).map_err(|err| match err {
            TrySendError::Full(_) => TriggerError::Busy,
            TrySendError::Closed(_) => TriggerError::Closed,
        })
    }

    pub fn scan(&self) -> Result<(), TriggerError> {
        self.try_trigger(ScanCommand::Scan)
    }

    pub fn clear(&self) -> Result<(), TriggerError> {
        self.try_trigger(ScanCommand::Clear)
    }

    pub fn toggle_language(&self) -> Result<(), TriggerError> {
        self.try_trigger(ScanCommand::ToggleLanguage)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub cycles: u64,
    pub completed: u64,
    pub unchanged: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub rendered: u64,
}

impl ScanSummary {
    fn record(&mut self, result: &Result<CycleOutcome, CycleError>) {
        self.cycles += 1;
        match result {
            Ok(CycleOutcome::Completed(report)) => {
                self.completed += 1;
                self.rendered += report.rendered as u64;
            }
            Ok(CycleOutcome::Unchanged) => self.unchanged += 1,
            Ok(CycleOutcome::Cancelled) => self.cancelled += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLoopConfig {
    /// Timer-driven triggers; `None` scans only on command.
    pub interval: Option<Duration>,
    /// How often expired labels are swept.
    pub expiry_tick: Duration,
    /// Exit after this many cycles of any outcome.
    pub max_cycles: Option<u64>,
}

impl Default for ScanLoopConfig {
    fn default() -> Self {
        Self {
            interval: None,
            expiry_tick: DEFAULT_EXPIRY_TICK,
            max_cycles: None,
        }
    }
}

/// Drives one [`PipelineController`] on a tokio task, one cycle at a time.
pub struct ScanLoop {
    controller: PipelineController,
    config: ScanLoopConfig,
}

impl ScanLoop {
    pub fn new(controller: PipelineController, config: ScanLoopConfig) -> Self {
        Self { controller, config }
    }

    /// Starts the loop. The task hands the controller back when it exits.
    pub fn spawn(self) -> (ScanTrigger, JoinHandle<(PipelineController, ScanSummary)>) {
        let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
        let busy = Arc::new(AtomicBool::new(false));
        let trigger = ScanTrigger {
            tx,
            busy: Arc::clone(&busy),
        };
        let handle = tokio::spawn(self.run(rx, busy));
        (trigger, handle)
    }

    async fn run(
        self,
        mut rx: mpsc::Receiver<ScanCommand>,
        busy: Arc<AtomicBool>,
    ) -> (PipelineController, ScanSummary) {
        let ScanLoop {
            mut controller,
            config,
        } = self;
        let mut summary = ScanSummary::default();
        let mut timer = config.interval.map(skipping_interval);
        let mut expiry = skipping_interval(config.expiry_tick);
        let mut commands_closed = false;

        info!(
            session = controller.session(),
            interval = ?config.interval,
            "scan loop started"
        );

        loop {
            let command = tokio::select! {
                _ = controller.stopped() => {
                    controller.shutdown();
                    break;
                }
                command = rx.recv(), if !commands_closed => match command {
                    Some(command) => command,
                    None => {
                        commands_closed = true;
                        if timer.is_none() {
                            break;
                        }
                        continue;
                    }
                },
                _ = next_tick(&mut timer) => ScanCommand::Scan,
                _ = expiry.tick() => {
                    controller.expire_labels(Instant::now());
                    continue;
                }
            };

            match command {
                ScanCommand::Clear => controller.clear(),
                ScanCommand::ToggleLanguage => {
                    controller.toggle_language();
                }
                ScanCommand::Scan => {
                    busy.store(true, Ordering::SeqCst);
                    let result = controller.scan().await;
                    busy.store(false, Ordering::SeqCst);
                    // Triggers that slipped in while the cycle ran are stale.
                    while rx.try_recv().is_ok() {}
                    summary.record(&result);

                    let session_over = match &result {
                        Ok(CycleOutcome::Cancelled) => true,
                        Err(err) => err.is_session_fatal(),
                        _ => false,
                    };
                    if session_over {
                        controller.shutdown();
                        break;
                    }
                    if config
                        .max_cycles
                        .is_some_and(|limit| summary.cycles >= limit)
                    {
                        debug!(cycles = summary.cycles, "cycle limit reached");
                        break;
                    }
                }
            }
        }

        info!(
            session = controller.session(),
            cycles = summary.cycles,
            rendered = summary.rendered,
            "scan loop finished"
        );
        (controller, summary)
    }
}

fn skipping_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
