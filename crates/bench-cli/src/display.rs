//! Live resource stats display

use crate::output::stats_table;
use bench_telemetry::SnapshotReader;
use indicatif::ProgressBar;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Print the stats table each time the sampler publishes a snapshot.
///
/// Runs until `stop` is cancelled or the sampler goes away. Output is routed
/// through the progress bar so the two do not overwrite each other.
pub fn spawn_stats_display(
    mut reader: SnapshotReader,
    bar: ProgressBar,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                changed = reader.changed() => {
                    if !changed {
                        break;
                    }
                    let table = stats_table(&reader.latest());
                    bar.suspend(|| println!("{}", table));
                }
            }
        }
        debug!("Stats display stopped");
    })
}
