//! Background telemetry sampler and the snapshot cell it publishes to

use crate::probe::DeviceProbe;
use crate::session::DeviceSession;
use crate::Result;
use bench_core::ResourceSnapshot;

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Read side of the snapshot cell.
///
/// Readers never wait for a new sample and never observe a partially written
/// snapshot: the cell is swapped as a whole by its single writer.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    rx: watch::Receiver<ResourceSnapshot>,
}

impl SnapshotReader {
    /// The most recently completed sample
    pub fn latest(&self) -> ResourceSnapshot {
        self.rx.borrow().clone()
    }

    /// Reader over a snapshot that never changes
    pub fn fixed(snapshot: ResourceSnapshot) -> Self {
        let (_tx, rx) = watch::channel(snapshot);
        Self { rx }
    }

    /// Wait for the next sample. Returns `false` once the sampler has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Starts the background sampling task
pub struct TelemetrySampler;

impl TelemetrySampler {
    /// Initialize the probe, publish a first sample and start sampling every `interval`.
    ///
    /// The sampler stops when `parent` (or the returned handle) is cancelled.
    pub async fn start(
        probe: Box<dyn DeviceProbe>,
        interval: Duration,
        parent: &CancellationToken,
    ) -> Result<SamplerHandle> {
        let mut session = DeviceSession::open(probe).await?;
        let backend = session.backend();

        let (tx, rx) = watch::channel(session.sample());
        let cancel = parent.child_token();

        info!("Starting {} telemetry sampler every {:?}", backend, interval);
        let task = tokio::spawn(run_sampler(session, tx, interval, cancel.clone()));

        Ok(SamplerHandle {
            reader: SnapshotReader { rx },
            cancel,
            task,
        })
    }
}

async fn run_sampler(
    mut session: DeviceSession,
    tx: watch::Sender<ResourceSnapshot>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately and the initial sample is already published
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Telemetry sampler cancelled");
                break;
            }
            _ = ticker.tick() => {
                tx.send_replace(session.sample());
            }
        }
    }

    session.finalize();
}

/// Handle to a running sampler
pub struct SamplerHandle {
    reader: SnapshotReader,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SamplerHandle {
    /// A new reader over the sampler's snapshot cell
    pub fn reader(&self) -> SnapshotReader {
        self.reader.clone()
    }

    /// The most recently completed sample
    pub fn latest(&self) -> ResourceSnapshot {
        self.reader.latest()
    }

    /// Stop sampling and wait until device handles have been released
    pub async fn shutdown(self) {
        info!("Stopping telemetry sampler");
        self.cancel.cancel();

        match self.task.await {
            Ok(()) => debug!("Telemetry sampler stopped"),
            Err(e) if e.is_panic() => error!("Telemetry sampler panicked: {}", e),
            Err(e) => error!("Telemetry sampler task failed: {}", e),
        }
    }
}
