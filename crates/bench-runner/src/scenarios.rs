//! End-to-end runs of the driver and aggregator against an in-process predictor

use async_trait::async_trait;
use bench_core::{
    image_name, BatchingConfig, CorpusConfig, ModelId, Prediction, Predictor, ResolutionClass,
    ResolutionFolder, ResolutionSpec, ResourceSnapshot, Result, MIB,
};
use crate::{corpus, summarize, BatchSizer, BenchmarkDriver, ProgressReporter, Summary};
use bench_telemetry::mock::MockProbe;
use bench_telemetry::{SnapshotReader, TelemetrySampler};

use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Records every call and answers immediately
#[derive(Default)]
struct RecordingPredictor {
    calls: Mutex<Vec<(String, String)>>,
}

impl RecordingPredictor {
    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Predictor for RecordingPredictor {
    async fn predict(&self, image: &Path, _task_prompt: &str, model: &ModelId) -> Result<Prediction> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), image_name(image)));
        Ok(json!([{ "label": "car" }]))
    }
}

/// Counts batches and cancels the run once `limit` batches have completed
struct CancelAfter {
    limit: usize,
    started: Mutex<Vec<usize>>,
    completed: AtomicUsize,
    cancel: CancellationToken,
}

impl ProgressReporter for CancelAfter {
    fn begin(&self, _total_steps: usize) {}

    fn batch_started(&self, _model: &ModelId, _class: &ResolutionClass, batch_size: usize) {
        self.started.lock().unwrap().push(batch_size);
    }

    fn advance(&self, _steps: usize) {
        if self.completed.fetch_add(1, Ordering::SeqCst) + 1 == self.limit {
            self.cancel.cancel();
        }
    }

    fn finish(&self) {}
}

fn folder(class: &str, count: usize) -> ResolutionFolder {
    let images = (0..count)
        .map(|i| PathBuf::from(format!("/corpus/{}/{:02}.jpg", class, i)))
        .collect();
    ResolutionFolder::new(class.into(), format!("/corpus/{}", class), images)
}

fn sizer() -> BatchSizer {
    BatchSizer::new(
        &[
            ResolutionSpec::new("720p", 50 * MIB),
            ResolutionSpec::new("1080p", 100 * MIB),
        ],
        &BatchingConfig::default(),
    )
}

fn fixed_memory(bytes: u64) -> SnapshotReader {
    SnapshotReader::fixed(ResourceSnapshot::unavailable().with_gpu_free_memory(bytes))
}

#[tokio::test]
async fn single_folder_fits_in_one_batch() {
    let dir = TempDir::new().unwrap();
    let folder_path = dir.path().join("720p");
    std::fs::create_dir_all(&folder_path).unwrap();
    for name in ["a.jpg", "b.png", "c.webp"] {
        std::fs::write(folder_path.join(name), b"img").unwrap();
    }
    let config = CorpusConfig {
        root: dir.path().to_path_buf(),
        resolutions: vec![ResolutionSpec::new("720p", 50 * MIB)],
        ..CorpusConfig::default()
    };
    let folders = corpus::discover(&config).unwrap();

    let predictor = Arc::new(RecordingPredictor::default());
    let cancel = CancellationToken::new();
    let progress = Arc::new(CancelAfter {
        limit: usize::MAX,
        started: Mutex::new(Vec::new()),
        completed: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });

    // 200MiB free * 0.8 = 160MiB usable at 50MiB per image
    let driver = BenchmarkDriver::new(predictor.clone(), fixed_memory(200 * MIB), sizer(), "Object Detection")
        .with_progress(progress.clone());
    let outcome = driver
        .run(&[ModelId::new("microsoft/Florence-2-base")], &folders, &cancel)
        .await;

    assert!(!outcome.interrupted);
    assert_eq!(*progress.started.lock().unwrap(), vec![3]);
    assert_eq!(outcome.rows.len(), 3);
    assert_eq!(predictor.calls().len(), 3);
    assert!(outcome
        .rows
        .iter()
        .all(|row| row.snapshot.gpu_free_memory == Some(200 * MIB)));
}

#[tokio::test]
async fn rows_follow_model_major_order() {
    let predictor = Arc::new(RecordingPredictor::default());
    let models = vec![ModelId::new("A"), ModelId::new("B")];
    let folders = vec![folder("720p", 2), folder("1080p", 2)];

    let outcome = BenchmarkDriver::new(predictor.clone(), fixed_memory(MIB), sizer(), "Object Detection")
        .run(&models, &folders, &CancellationToken::new())
        .await;

    let order: Vec<(String, String, String)> = outcome
        .rows
        .iter()
        .map(|r| (r.model.to_string(), r.resolution.to_string(), r.image.clone()))
        .collect();
    let expected: Vec<(String, String, String)> = [
        ("A", "720p", "00.jpg"),
        ("A", "720p", "01.jpg"),
        ("A", "1080p", "00.jpg"),
        ("A", "1080p", "01.jpg"),
        ("B", "720p", "00.jpg"),
        ("B", "720p", "01.jpg"),
        ("B", "1080p", "00.jpg"),
        ("B", "1080p", "01.jpg"),
    ]
    .iter()
    .map(|(m, r, i)| (m.to_string(), r.to_string(), i.to_string()))
    .collect();

    assert_eq!(order, expected);
    assert_eq!(predictor.calls().len(), 8);
}

#[tokio::test]
async fn cancellation_returns_completed_batches_only() {
    let predictor = Arc::new(RecordingPredictor::default());
    let cancel = CancellationToken::new();
    let progress = Arc::new(CancelAfter {
        limit: 2,
        started: Mutex::new(Vec::new()),
        completed: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });

    // no memory reading: ten batches of one image
    let driver = BenchmarkDriver::new(
        predictor.clone(),
        SnapshotReader::fixed(ResourceSnapshot::unavailable()),
        sizer(),
        "Object Detection",
    )
    .with_progress(progress);
    let outcome = driver.run(&[ModelId::new("A")], &[folder("720p", 10)], &cancel).await;

    assert!(outcome.interrupted);
    assert_eq!(outcome.rows.len(), 2);
    assert_eq!(predictor.calls().len(), 2);

    let report = summarize(&outcome.rows).report().cloned().unwrap();
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].images, 2);
    let expected_sum: f64 = outcome.rows.iter().filter_map(|r| r.elapsed_secs()).sum();
    assert!((report.groups[0].sum_secs - expected_sum).abs() < 1e-12);
    assert_eq!(report.best_model.unwrap().key.as_str(), "A");
}

/// Never answers the third call and cancels the run instead
struct StallingPredictor {
    calls: AtomicUsize,
    cancel: CancellationToken,
}

#[async_trait]
impl Predictor for StallingPredictor {
    async fn predict(&self, _image: &Path, _task_prompt: &str, _model: &ModelId) -> Result<Prediction> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 2 {
            self.cancel.cancel();
            std::future::pending::<()>().await;
        }
        Ok(json!(null))
    }
}

#[tokio::test]
async fn in_flight_batch_is_abandoned_on_cancellation() {
    let cancel = CancellationToken::new();
    let predictor = Arc::new(StallingPredictor {
        calls: AtomicUsize::new(0),
        cancel: cancel.clone(),
    });

    let outcome = BenchmarkDriver::new(
        predictor,
        SnapshotReader::fixed(ResourceSnapshot::unavailable()),
        sizer(),
        "Object Detection",
    )
    .run(&[ModelId::new("A")], &[folder("720p", 5)], &cancel)
    .await;

    assert!(outcome.interrupted);
    assert_eq!(outcome.rows.len(), 2);
}

#[test]
fn empty_rows_summarize_to_no_results() {
    assert_eq!(summarize(&[]), Summary::NoResults);
}

#[tokio::test]
async fn row_count_matches_images_times_models() {
    let predictor = Arc::new(RecordingPredictor::default());
    let models = vec![ModelId::new("A"), ModelId::new("B"), ModelId::new("C")];
    let folders = vec![folder("720p", 4), folder("1080p", 0), folder("4k", 3)];

    let outcome = BenchmarkDriver::new(predictor, fixed_memory(120 * MIB), sizer(), "Object Detection")
        .with_parallel_dispatch(true)
        .run(&models, &folders, &CancellationToken::new())
        .await;

    assert_eq!(outcome.rows.len(), 7 * models.len());
    let report = summarize(&outcome.rows).report().cloned().unwrap();
    assert_eq!(report.total_rows, 21);
    assert_eq!(report.failed_rows, 0);
    assert_eq!(report.groups.iter().map(|g| g.images).sum::<usize>(), 21);
}

#[tokio::test]
async fn summaries_are_deterministic() {
    let predictor = Arc::new(RecordingPredictor::default());
    let outcome = BenchmarkDriver::new(predictor, fixed_memory(MIB), sizer(), "Object Detection")
        .run(
            &[ModelId::new("A"), ModelId::new("B")],
            &[folder("720p", 3), folder("1080p", 3)],
            &CancellationToken::new(),
        )
        .await;

    let first = summarize(&outcome.rows);
    for _ in 0..10 {
        assert_eq!(summarize(&outcome.rows), first);
    }
}

#[tokio::test]
async fn driver_reads_live_sampler_snapshots() {
    let probe = MockProbe::new().with_reading(ResourceSnapshot::unavailable().with_gpu_free_memory(200 * MIB));
    let counters = probe.counters();
    let cancel = CancellationToken::new();
    let sampler = TelemetrySampler::start(Box::new(probe), Duration::from_millis(10), &cancel)
        .await
        .unwrap();

    let predictor = Arc::new(RecordingPredictor::default());
    let outcome = BenchmarkDriver::new(predictor, sampler.reader(), sizer(), "Object Detection")
        .run(&[ModelId::new("A")], &[folder("720p", 6)], &cancel)
        .await;
    sampler.shutdown().await;

    assert_eq!(outcome.rows.len(), 6);
    assert!(outcome.rows.iter().all(|r| r.snapshot.gpu_free_memory == Some(200 * MIB)));
    assert_eq!(counters.shutdowns(), 1);
}
