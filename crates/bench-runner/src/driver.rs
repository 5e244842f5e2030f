//! Benchmark driver: walks the model × resolution matrix and times every dispatch

use crate::progress::{NoopProgress, ProgressReporter};
use crate::sizer::BatchSizer;
use bench_core::{
    image_name, ModelId, Prediction, Predictor, ResolutionClass, ResolutionFolder, Result,
    ResultRow, RowOutcome,
};
use bench_telemetry::SnapshotReader;

use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Rows collected by a run and whether the run was cut short
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    /// Rows in dispatch order
    pub rows: Vec<ResultRow>,
    pub interrupted: bool,
}

impl RunOutcome {
    pub fn failed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_failed()).count()
    }
}

/// Drives one benchmark run against a predictor
pub struct BenchmarkDriver {
    predictor: Arc<dyn Predictor>,
    telemetry: SnapshotReader,
    sizer: BatchSizer,
    task_prompt: String,
    parallel_dispatch: bool,
    progress: Arc<dyn ProgressReporter>,
}

impl BenchmarkDriver {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        telemetry: SnapshotReader,
        sizer: BatchSizer,
        task_prompt: impl Into<String>,
    ) -> Self {
        Self {
            predictor,
            telemetry,
            sizer,
            task_prompt: task_prompt.into(),
            parallel_dispatch: false,
            progress: Arc::new(NoopProgress),
        }
    }

    /// Issue the calls of a batch concurrently
    pub fn with_parallel_dispatch(mut self, parallel: bool) -> Self {
        self.parallel_dispatch = parallel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Number of image dispatches a full run performs
    pub fn total_steps(models: &[ModelId], folders: &[ResolutionFolder]) -> usize {
        folders.iter().map(ResolutionFolder::len).sum::<usize>() * models.len()
    }

    /// Run the matrix model-major: every folder for one model before the next model.
    ///
    /// Cancellation stops the run before the next batch, or abandons the batch
    /// in flight; either way only rows from completed batches are returned.
    pub async fn run(
        &self,
        models: &[ModelId],
        folders: &[ResolutionFolder],
        cancel: &CancellationToken,
    ) -> RunOutcome {
        let total_steps = Self::total_steps(models, folders);
        info!(
            "Starting benchmark: {} models, {} folders, {} dispatches against {}",
            models.len(),
            folders.len(),
            total_steps,
            self.predictor.describe()
        );
        self.progress.begin(total_steps);

        let mut outcome = RunOutcome {
            rows: Vec::with_capacity(total_steps),
            interrupted: false,
        };

        'matrix: for model in models {
            info!("Benchmarking model {}", model);

            for folder in folders {
                if folder.is_empty() {
                    debug!("Skipping empty resolution folder {}", folder.path.display());
                    continue;
                }

                // sized once per folder from the snapshot current at its first dispatch
                let batch_size = self.sizer.batch_size(&folder.class, &self.telemetry.latest());
                info!(
                    "Using batch size {} for {} images at {}",
                    batch_size,
                    folder.len(),
                    folder.class
                );

                for batch in folder.images.chunks(batch_size) {
                    if cancel.is_cancelled() {
                        outcome.interrupted = true;
                        break 'matrix;
                    }

                    self.progress.batch_started(model, &folder.class, batch.len());
                    let completed = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        rows = self.run_batch(model, &folder.class, batch) => Some(rows),
                    };

                    match completed {
                        Some(rows) => {
                            outcome.rows.extend(rows);
                            self.progress.advance(batch.len());
                        }
                        None => {
                            warn!("Batch at {} with {} abandoned on cancellation", folder.class, model);
                            outcome.interrupted = true;
                            break 'matrix;
                        }
                    }
                }
            }
        }

        self.progress.finish();
        if outcome.interrupted {
            info!("Benchmark interrupted after {} rows", outcome.rows.len());
        } else {
            info!(
                "Benchmark complete: {} rows, {} failed",
                outcome.rows.len(),
                outcome.failed_count()
            );
        }
        outcome
    }

    /// Dispatch one batch and attribute its wall-clock time evenly to its images
    async fn run_batch(
        &self,
        model: &ModelId,
        class: &ResolutionClass,
        batch: &[PathBuf],
    ) -> Vec<ResultRow> {
        debug!("Processing batch ({} images) at {} with {}", batch.len(), class, model);

        let started = Instant::now();
        let results = self.dispatch(model, batch).await;
        let per_image = started.elapsed().as_secs_f64() / batch.len() as f64;
        let snapshot = self.telemetry.latest();

        batch
            .iter()
            .zip(results)
            .map(|(image, result)| {
                let outcome = match result {
                    Ok(_) => RowOutcome::Completed {
                        elapsed_secs: per_image,
                    },
                    Err(e) => {
                        warn!(
                            "Prediction failed for {} with {} ({}): {}",
                            image.display(),
                            model,
                            e.category(),
                            e
                        );
                        RowOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                };

                ResultRow {
                    model: model.clone(),
                    resolution: class.clone(),
                    image: image_name(image),
                    outcome,
                    snapshot: snapshot.clone(),
                }
            })
            .collect()
    }

    /// One predictor call per image, in image order
    async fn dispatch(&self, model: &ModelId, batch: &[PathBuf]) -> Vec<Result<Prediction>> {
        if self.parallel_dispatch {
            return join_all(
                batch
                    .iter()
                    .map(|image| self.predictor.predict(image, &self.task_prompt, model)),
            )
            .await;
        }

        let mut results = Vec::with_capacity(batch.len());
        for image in batch {
            results.push(self.predictor.predict(image, &self.task_prompt, model).await);
        }
        results
    }
}
