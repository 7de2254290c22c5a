use std::future::Future;
use std::sync::Arc;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use screen_translate::{
    CycleError, CycleOutcome, Label, LabelId, OverlayManager, OverlaySink, PipelineConfig,
    PipelineController, ScanLoop, ScanLoopConfig, TriggerError,
};
use screen_translate_capture::backends::synthetic::SyntheticDisplay;
use screen_translate_capture::{
    CaptureError, CaptureSessionLifecycle, CaptureToken, FrameSourceConfig, SessionHandle,
};
use screen_translate_comparator::{ChangeGate, SampledExactComparator};
use screen_translate_ocr::{DetectError, DetectRequest, TextDetector};
use screen_translate_translator::{TranslateError, Translator};
use screen_translate_types::{LanguageHint, Rect, TextRegion};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 64;

struct ScriptedDetector {
    regions: Vec<TextRegion>,
    calls: AtomicUsize,
    fail_next: AtomicBool,
    languages: Mutex<Vec<LanguageHint>>,
}

impl TextDetector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&self, request: &DetectRequest<'_>) -> Result<Vec<TextRegion>, DetectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.languages.lock().push(request.language());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DetectError::failed("recognizer crashed"));
        }
        Ok(self.regions.clone())
    }
}

#[derive(Default)]
struct ScriptedTranslator {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
    failing: Option<&'static str>,
    hanging: Option<&'static str>,
    blank: Option<&'static str>,
    delays: Vec<(&'static str, u64)>,
    /// Stops this session right before answering.
    stops: Mutex<Option<SessionHandle>>,
}

#[async_trait]
impl Translator for ScriptedTranslator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(text.to_string());
        if self.hanging == Some(text) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if let Some((_, millis)) = self.delays.iter().find(|(delayed, _)| *delayed == text) {
            tokio::time::sleep(Duration::from_millis(*millis)).await;
        }
        if let Some(session) = self.stops.lock().as_ref() {
            session.stop();
        }
        if self.blank == Some(text) {
            return Ok("  ".into());
        }
        if self.failing == Some(text) {
            return Err(TranslateError::Status {
                code: 500,
                body: "upstream failure".into(),
            });
        }
        Ok(format!("<{text}>"))
    }
}

#[derive(Default)]
struct RecordingSink {
    visible: Mutex<Vec<(LabelId, String)>>,
    shown: AtomicUsize,
}

impl RecordingSink {
    fn visible_texts(&self) -> Vec<String> {
        self.visible.lock().iter().map(|(_, text)| text.clone()).collect()
    }
}

impl OverlaySink for RecordingSink {
    fn show(&self, label: &Label) {
        self.shown.fetch_add(1, Ordering::SeqCst);
        self.visible
            .lock()
            .push((label.id, label.entry.translated_text.clone()));
    }

    fn hide(&self, id: LabelId) {
        self.visible.lock().retain(|(visible, _)| *visible != id);
    }
}

struct Harness {
    display: SyntheticDisplay,
    lifecycle: CaptureSessionLifecycle,
    session: SessionHandle,
    controller: PipelineController,
    detector: Arc<ScriptedDetector>,
    translator: Arc<ScriptedTranslator>,
    sink: Arc<RecordingSink>,
}

fn region(text: &str, row: i32) -> TextRegion {
    TextRegion::new(text, Rect::new(0, row * 10, 40, row * 10 + 8))
}

fn fast_frames() -> FrameSourceConfig {
    FrameSourceConfig {
        settle: Duration::from_millis(1),
        timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(2),
    }
}

fn harness(regions: Vec<TextRegion>, translator: ScriptedTranslator) -> Harness {
    harness_with(regions, translator, PipelineConfig::default())
}

fn harness_with(
    regions: Vec<TextRegion>,
    translator: ScriptedTranslator,
    config: PipelineConfig,
) -> Harness {
    let display = SyntheticDisplay::new(WIDTH, HEIGHT);
    display.fill([30, 30, 30, 255]);
    let lifecycle =
        CaptureSessionLifecycle::with_frame_config(Arc::new(display.clone()), fast_frames())
            .unwrap();
    let session = lifecycle.authorize(CaptureToken::new("test")).unwrap();
    let source = session.begin().unwrap();

    let detector = Arc::new(ScriptedDetector {
        regions,
        calls: AtomicUsize::new(0),
        fail_next: AtomicBool::new(false),
        languages: Mutex::new(Vec::new()),
    });
    let translator = Arc::new(translator);
    let sink = Arc::new(RecordingSink::default());
    let gate = ChangeGate::new(Arc::new(SampledExactComparator::new(8)), 0.9);
    let controller = PipelineController::new(
        source,
        gate,
        detector.clone(),
        translator.clone(),
        OverlayManager::new(sink.clone()),
        config,
    );

    Harness {
        display,
        lifecycle,
        session,
        controller,
        detector,
        translator,
        sink,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    let polled = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), polled)
        .await
        .expect("condition not reached in time");
}

async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("future did not finish in time")
}

#[tokio::test]
async fn repeated_text_is_translated_once_per_cycle() {
    let mut h = harness(
        vec![
            region("こんにちは", 0),
            region("こんにちは", 1),
            region("さようなら", 2),
        ],
        ScriptedTranslator::default(),
    );

    let outcome = h.controller.scan().await.unwrap();
    let CycleOutcome::Completed(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.regions, 3);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rendered, 2);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.sink.visible_texts(),
        vec!["<こんにちは>".to_string(), "<さようなら>".to_string()]
    );
    assert_eq!(h.controller.overlay().len(), 2);
}

#[tokio::test]
async fn short_and_blank_text_never_reaches_the_translator() {
    let mut h = harness(
        vec![region("  ", 0), region("あ", 1), region(" 日本語 ", 2)],
        ScriptedTranslator::default(),
    );

    let outcome = h.controller.scan().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed(report) if report.rendered == 1));
    assert_eq!(*h.translator.seen.lock(), vec!["日本語".to_string()]);
}

#[tokio::test]
async fn nearly_identical_frame_skips_detection() {
    let mut h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    h.controller.scan().await.unwrap();
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 1);

    // One sampled pixel out of 64 changes: well under the 10% budget.
    h.display.paint(|data| data[..4].copy_from_slice(&[200, 0, 0, 255]));
    let outcome = h.controller.scan().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Unchanged);
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.sink.visible_texts(), vec!["<こんにちは>".to_string()]);

    h.display.fill([220, 220, 220, 255]);
    let outcome = h.controller.scan().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed(_)));
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 2);
    // The changed frame cleared the ledger, so the same text is translated again.
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.sink.visible_texts(), vec!["<こんにちは>".to_string()]);
}

#[tokio::test]
async fn user_clear_forces_the_next_scan_through_the_gate() {
    let mut h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    h.controller.scan().await.unwrap();

    h.controller.clear();
    assert!(h.sink.visible_texts().is_empty());
    let outcome = h.controller.scan().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed(report) if report.rendered == 1));
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_translation_drops_only_its_region() {
    let mut h = harness(
        vec![region("こんにちは", 0), region("さようなら", 1)],
        ScriptedTranslator {
            failing: Some("こんにちは"),
            ..ScriptedTranslator::default()
        },
    );

    let outcome = h.controller.scan().await.unwrap();
    let CycleOutcome::Completed(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.rendered, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(h.sink.visible_texts(), vec!["<さようなら>".to_string()]);
}

#[tokio::test]
async fn empty_surface_aborts_the_cycle_without_detection() {
    let mut h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    h.display.blank();

    let err = h.controller.scan().await.unwrap_err();
    assert!(matches!(
        err,
        CycleError::Capture(CaptureError::NoFrameAvailable { .. })
    ));
    assert!(!err.is_session_fatal());
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 0);

    // The session survives; the next trigger works once the mirror has content.
    h.display.fill([1, 2, 3, 255]);
    assert!(matches!(
        h.controller.scan().await.unwrap(),
        CycleOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn beginning_twice_reuses_the_surface() {
    let h = harness(Vec::new(), ScriptedTranslator::default());
    let again = h.session.begin().unwrap();
    assert_eq!(again.session(), h.session.id());
    assert_eq!(h.display.allocations(), 1);

    let reauthorized = h.lifecycle.authorize(CaptureToken::new("again")).unwrap();
    assert_eq!(reauthorized.id(), h.session.id());
    assert_eq!(h.display.allocations(), 1);
}

#[tokio::test]
async fn stop_cancels_in_flight_translation_and_clears_labels() {
    let h = harness(
        vec![region("こんにちは", 0), region("さようなら", 1)],
        ScriptedTranslator {
            hanging: Some("さようなら"),
            ..ScriptedTranslator::default()
        },
    );
    let Harness {
        session,
        mut controller,
        translator,
        sink,
        display,
        ..
    } = h;

    let cycle = tokio::spawn(async move {
        let outcome = controller.scan().await;
        (controller, outcome)
    });
    wait_until(|| sink.shown.load(Ordering::SeqCst) == 1 && translator.calls.load(Ordering::SeqCst) == 2)
        .await;

    session.stop();
    let (controller, outcome) = within(cycle).await.unwrap();
    assert_eq!(outcome.unwrap(), CycleOutcome::Cancelled);
    assert!(controller.overlay().is_empty());
    assert!(sink.visible_texts().is_empty());
    assert!(controller.is_stopped());
    assert_eq!(display.releases(), 1);
}

#[tokio::test]
async fn scan_after_platform_revocation_is_fatal() {
    let mut h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    h.controller.scan().await.unwrap();

    h.session.platform_signal().fire();
    let err = h.controller.scan().await.unwrap_err();
    assert!(err.is_session_fatal());
    assert!(h.sink.visible_texts().is_empty());
    assert_eq!(h.display.releases(), 1);
}

#[tokio::test]
async fn scan_loop_refuses_triggers_while_busy() {
    let h = harness(
        vec![region("さようなら", 0)],
        ScriptedTranslator {
            hanging: Some("さようなら"),
            ..ScriptedTranslator::default()
        },
    );
    let translator = h.translator.clone();
    let (trigger, handle) = ScanLoop::new(h.controller, ScanLoopConfig::default()).spawn();

    trigger.scan().unwrap();
    wait_until(|| translator.calls.load(Ordering::SeqCst) == 1).await;
    assert!(trigger.is_busy());
    assert_eq!(trigger.scan(), Err(TriggerError::Busy));

    h.session.stop();
    let (_, summary) = within(handle).await.unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(trigger.scan(), Err(TriggerError::Closed));
}

#[tokio::test]
async fn scan_loop_clear_and_close() {
    let h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    let sink = h.sink.clone();
    let (trigger, handle) = ScanLoop::new(h.controller, ScanLoopConfig::default()).spawn();

    trigger.scan().unwrap();
    wait_until(|| sink.visible_texts().len() == 1).await;
    wait_until(|| !trigger.is_busy()).await;

    // The channel holds one command; retry while the loop drains it.
    wait_until(|| trigger.clear().is_ok()).await;
    wait_until(|| sink.visible_texts().is_empty()).await;

    drop(trigger);
    let (controller, summary) = within(handle).await.unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.rendered, 1);
    assert!(!controller.is_stopped());
    h.session.stop();
}

#[tokio::test]
async fn scan_loop_stops_after_cycle_limit() {
    let h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    let config = ScanLoopConfig {
        interval: Some(Duration::from_millis(5)),
        max_cycles: Some(3),
        ..ScanLoopConfig::default()
    };
    let (_trigger, handle) = ScanLoop::new(h.controller, config).spawn();

    let (_, summary) = within(handle).await.unwrap();
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.unchanged, 2);
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn detection_failure_keeps_the_session_and_the_baseline() {
    let mut h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    h.detector.fail_next.store(true, Ordering::SeqCst);

    let err = h.controller.scan().await.unwrap_err();
    assert!(matches!(err, CycleError::Detection(_)));
    assert!(!err.is_session_fatal());
    assert!(h.session.is_live());
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 0);
    assert!(h.sink.visible_texts().is_empty());

    // Same screen: the failed cycle never became the baseline, so it is detected again.
    let outcome = h.controller.scan().await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Completed(report) if report.rendered == 1));
    assert_eq!(h.detector.calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.sink.visible_texts(), vec!["<こんにちは>".to_string()]);
}

#[tokio::test]
async fn blank_translation_is_dropped_as_failed() {
    let mut h = harness(
        vec![region("こんにちは", 0), region("さようなら", 1)],
        ScriptedTranslator {
            blank: Some("こんにちは"),
            ..ScriptedTranslator::default()
        },
    );

    let outcome = h.controller.scan().await.unwrap();
    let CycleOutcome::Completed(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.failed, 1);
    assert_eq!(report.rendered, 1);
    assert_eq!(h.sink.visible_texts(), vec!["<さようなら>".to_string()]);
    assert_eq!(h.controller.overlay().len(), 1);
}

#[tokio::test]
async fn concurrent_translations_render_in_detector_order() {
    let mut h = harness_with(
        vec![
            region("ひとつめ", 0),
            region("ふたつめ", 1),
            region("ひとつめ", 2),
            region("みっつめ", 3),
        ],
        ScriptedTranslator {
            delays: vec![("ひとつめ", 60), ("ふたつめ", 5), ("みっつめ", 30)],
            ..ScriptedTranslator::default()
        },
        PipelineConfig {
            concurrency: NonZeroUsize::new(3).unwrap(),
            ..PipelineConfig::default()
        },
    );

    let outcome = h.controller.scan().await.unwrap();
    let CycleOutcome::Completed(report) = outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert_eq!(report.skipped, 1);
    assert_eq!(report.rendered, 3);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        h.sink.visible_texts(),
        vec![
            "<ひとつめ>".to_string(),
            "<ふたつめ>".to_string(),
            "<みっつめ>".to_string()
        ]
    );
}

#[tokio::test]
async fn stop_racing_a_finished_translation_renders_nothing() {
    let mut h = harness(vec![region("こんにちは", 0)], ScriptedTranslator::default());
    *h.translator.stops.lock() = Some(h.session.clone());

    let outcome = within(h.controller.scan()).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Cancelled);
    assert_eq!(h.translator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.sink.shown.load(Ordering::SeqCst), 0);
    assert!(h.controller.overlay().is_empty());
}

#[tokio::test]
async fn scan_loop_toggles_the_source_language() {
    let h = harness(vec![region("안녕하세요", 0)], ScriptedTranslator::default());
    let detector = h.detector.clone();
    let sink = h.sink.clone();
    let (trigger, handle) = ScanLoop::new(h.controller, ScanLoopConfig::default()).spawn();

    trigger.scan().unwrap();
    wait_until(|| sink.visible_texts().len() == 1).await;
    wait_until(|| trigger.toggle_language().is_ok()).await;
    // The toggle clears, so the unchanged screen is detected again.
    wait_until(|| sink.visible_texts().is_empty()).await;
    wait_until(|| trigger.scan().is_ok()).await;
    wait_until(|| detector.calls.load(Ordering::SeqCst) == 2).await;

    drop(trigger);
    let (controller, summary) = within(handle).await.unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(controller.config().language, LanguageHint::Korean);
    assert_eq!(
        *detector.languages.lock(),
        vec![LanguageHint::Japanese, LanguageHint::Korean]
    );
    h.session.stop();
}
