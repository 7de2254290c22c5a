//! Scan pipeline of the screen translator: gate, detect, dedup, translate and
//! overlay, driven once per trigger over a live capture session.

pub mod app;
pub mod cli;
pub mod console;
pub mod ledger;
pub mod overlay;
pub mod pipeline;
pub mod scan_loop;
pub mod settings;

pub use ledger::DedupLedger;
pub use overlay::{Label, LabelId, LabelLayout, NullSink, OverlayManager, OverlaySink};
pub use pipeline::{
    CycleError, CycleOutcome, CyclePhase, CycleReport, PipelineConfig, PipelineController,
};
pub use scan_loop::{
    ScanCommand, ScanLoop, ScanLoopConfig, ScanSummary, ScanTrigger, TriggerError,
};
