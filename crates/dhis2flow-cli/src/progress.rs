//! Progress indicators for pipeline runs
//!
//! [`ProgressSink`] turns executor events into a step progress bar and still
//! forwards every event to `tracing`.

use dhis2flow_engine::events::{EventSink, RunEvent, TracingSink};
use dhis2flow_engine::executor::StepStatus;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar counting finished steps
pub fn create_step_progress(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} steps")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}

/// Event sink driving a step progress bar
pub struct ProgressSink {
    bar: ProgressBar,
    inner: TracingSink,
}

impl ProgressSink {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            inner: TracingSink,
        }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, event: &RunEvent) {
        self.inner.emit(event);
        match event {
            RunEvent::StepStarted { step, .. } => self.bar.set_message(format!("Running {step}")),
            RunEvent::RetryScheduled { step, attempt, max_attempts, delay, .. } => {
                self.bar.set_message(format!(
                    "Retrying {step} ({}/{max_attempts}) in {delay:?}",
                    attempt + 1
                ));
            },
            RunEvent::StepFinished { step, status, .. } => {
                self.bar.inc(1);
                if *status == StepStatus::Failed {
                    self.bar.println(format!("step '{step}' failed"));
                }
            },
            _ => {},
        }
    }
}
