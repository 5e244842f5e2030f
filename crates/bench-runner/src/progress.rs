//! Progress reporting hooks for the benchmark driver

use bench_core::{ModelId, ResolutionClass};

/// Receives progress notifications from a benchmark run.
///
/// Progress is informational only; implementations must not influence the
/// order or content of dispatched batches.
pub trait ProgressReporter: Send + Sync {
    /// Called once before the first batch with the number of planned image dispatches
    fn begin(&self, total_steps: usize);

    /// Called before each batch is dispatched
    fn batch_started(&self, model: &ModelId, class: &ResolutionClass, batch_size: usize);

    /// Called after each completed batch with the number of images it held
    fn advance(&self, steps: usize);

    /// Called once when the run ends, completed or not
    fn finish(&self);
}

/// Reporter that discards every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn begin(&self, _total_steps: usize) {}

    fn batch_started(&self, _model: &ModelId, _class: &ResolutionClass, _batch_size: usize) {}

    fn advance(&self, _steps: usize) {}

    fn finish(&self) {}
}
