//! Terminal progress bar for benchmark runs

use bench_core::{ModelId, ResolutionClass};
use bench_runner::ProgressReporter;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter drawing an indicatif bar on stderr
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// Create a reporter; a hidden bar swallows every update
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { bar }
    }

    /// Handle for printing above the bar without tearing it
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }
}

impl ProgressReporter for BarProgress {
    fn begin(&self, total_steps: usize) {
        self.bar.set_length(total_steps as u64);
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    fn batch_started(&self, model: &ModelId, class: &ResolutionClass, batch_size: usize) {
        self.bar.set_message(format!(
            "Processing batch ({} images) at {} with {}",
            batch_size, class, model
        ));
    }

    fn advance(&self, steps: usize) {
        self.bar.inc(steps as u64);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
