use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use crate::overlay::{Label, LabelId, OverlaySink};

fn scanning_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan.bold} {msg} [{elapsed_precise}]")
        .map(|style| style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"))
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Terminal stand-in for the floating overlay: labels are printed as lines
/// and the scanning indicator is a spinner.
#[derive(Default)]
pub struct ConsoleSink {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn print(&self, line: String) {
        match self.spinner.lock().as_ref() {
            Some(spinner) => spinner.println(line),
            None => println!("{line}"),
        }
    }
}

pub fn format_label(label: &Label) -> String {
    let bounds = label.entry.bounds;
    format!(
        "[{left},{top} {width}x{height}] {source} -> {translated}",
        left = label.layout.left,
        top = label.layout.top,
        width = bounds.width(),
        height = bounds.height(),
        source = label.entry.source_text.trim(),
        translated = label.entry.translated_text,
    )
}

impl OverlaySink for ConsoleSink {
    fn show(&self, label: &Label) {
        self.print(format_label(label));
    }

    fn hide(&self, _: LabelId) {}

    fn show_scan_indicator(&self) {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(scanning_spinner_style());
        spinner.set_message("scanning");
        spinner.enable_steady_tick(Duration::from_millis(100));
        if let Some(previous) = self.spinner.lock().replace(spinner) {
            previous.finish_and_clear();
        }
    }

    fn hide_scan_indicator(&self) {
        if let Some(spinner) = self.spinner.lock().take() {
            spinner.finish_and_clear();
        }
    }
}
