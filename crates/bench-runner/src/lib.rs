//! # bench-runner
//!
//! Batch sizing, dispatch and aggregation for haystack-bench.
//!
//! This crate provides:
//! - Corpus discovery of one image folder per resolution class
//! - Memory-aware batch sizing from the latest telemetry snapshot
//! - The benchmark driver walking the model × resolution matrix
//! - A Gradio HTTP client implementing the remote predictor
//! - Aggregation of per-image rows into per-model and per-resolution verdicts
//!
//! ## Example
//!
//! ```rust,no_run
//! use bench_core::BenchConfig;
//! use bench_runner::{corpus, summarize, BatchSizer, BenchmarkDriver, GradioPredictor};
//! use bench_telemetry::{create_probe, TelemetrySampler};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BenchConfig::load(None)?;
//!     let folders = corpus::discover(&config.corpus)?;
//!
//!     let cancel = CancellationToken::new();
//!     let probe = create_probe(&config.telemetry)?;
//!     let sampler = TelemetrySampler::start(probe, config.telemetry.interval(), &cancel).await?;
//!
//!     let driver = BenchmarkDriver::new(
//!         Arc::new(GradioPredictor::new(&config.predictor)?),
//!         sampler.reader(),
//!         BatchSizer::new(&config.corpus.resolutions, &config.batching),
//!         config.predictor.task_prompt.clone(),
//!     );
//!     let outcome = driver.run(&config.models, &folders, &cancel).await;
//!     sampler.shutdown().await;
//!
//!     println!("{:?}", summarize(&outcome.rows));
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod corpus;
pub mod driver;
pub mod gradio;
pub mod progress;
pub mod sizer;

#[cfg(test)]
mod scenarios;

pub use aggregate::{summarize, Average, GroupStats, Report, Summary};
pub use driver::{BenchmarkDriver, RunOutcome};
pub use gradio::GradioPredictor;
pub use progress::{NoopProgress, ProgressReporter};
pub use sizer::{batch_size_for, BatchSizer};
