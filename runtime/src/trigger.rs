//! Terminal rendition of the generation trigger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cardharvest::TriggerControl;
use indicatif::{ProgressBar, ProgressStyle};

/// Label shown while idle.
pub const RESTING_LABEL: &str = "style";
/// Label shown while a generation runs.
pub const BUSY_LABEL: &str = "hourglass_top";

/// A spinner line: static with the resting label, spinning while busy.
pub struct SpinnerTrigger {
    bar: ProgressBar,
    busy: AtomicBool,
    echo_alerts: bool,
}

impl SpinnerTrigger {
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    /// No terminal output except alerts. Used for `--quiet` and `--json`.
    pub fn hidden() -> Self {
        Self::with_bar(ProgressBar::hidden())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} [{msg}] {elapsed:.dim}") {
            bar.set_style(style);
        }
        bar.set_message(RESTING_LABEL);
        Self {
            bar,
            busy: AtomicBool::new(false),
            echo_alerts: true,
        }
    }

    /// Leave alerts to the log, for callers that report the error themselves.
    pub fn without_alerts(mut self) -> Self {
        self.echo_alerts = false;
        self
    }

    pub fn label(&self) -> String {
        self.bar.message()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Print a line without tearing the spinner.
    pub fn println(&self, line: &str) {
        self.bar.suspend(|| eprintln!("{line}"));
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for SpinnerTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerControl for SpinnerTrigger {
    fn set_busy(&self) {
        self.busy.store(true, Ordering::Release);
        self.bar.reset_elapsed();
        self.bar.set_message(BUSY_LABEL);
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn restore(&self) {
        self.bar.disable_steady_tick();
        self.bar.set_message(RESTING_LABEL);
        self.busy.store(false, Ordering::Release);
    }

    fn alert(&self, message: &str) {
        if !self.echo_alerts {
            return;
        }
        self.bar
            .suspend(|| eprintln!("  \x1b[31merror:\x1b[0m An error occurred: {message}"));
    }
}
