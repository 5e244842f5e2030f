//! # bench-telemetry
//!
//! Compute-resource telemetry for haystack-bench.
//!
//! This crate provides:
//! - Device probes reading CPU load and GPU load, temperature, clock, fan, power and free memory
//! - A single-writer, multi-reader snapshot cell holding the latest reading
//! - A background sampler that refreshes the cell on a fixed cadence
//! - A device session guard that releases device handles exactly once
//!
//! ## Supported Backends
//!
//! - **NVML**: NVIDIA Management Library via `nvml-wrapper` (feature `nvml`)
//! - **Host**: CPU load only, GPU metrics reported as unavailable
//! - **Mock**: scripted readings for tests (feature `mock`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use bench_core::TelemetryConfig;
//! use bench_telemetry::{create_probe, TelemetrySampler};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TelemetryConfig::default();
//!     let probe = create_probe(&config)?;
//!
//!     let sampler = TelemetrySampler::start(probe, config.interval(), &CancellationToken::new()).await?;
//!     println!("latest: {:?}", sampler.reader().latest());
//!
//!     sampler.shutdown().await;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod probe;
pub mod sampler;
pub mod session;

#[cfg(feature = "nvml")]
pub mod nvml;

// Mock implementation for testing
#[cfg(any(feature = "mock", test))]
pub mod mock;

pub use probe::{create_probe, CpuMeter, DeviceProbe, HostProbe};
pub use sampler::{SamplerHandle, SnapshotReader, TelemetrySampler};
pub use session::DeviceSession;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors that can occur while setting up or tearing down telemetry
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Telemetry backend not supported: {0}")]
    UnsupportedBackend(String),

    #[error("NVML error: {0}")]
    Nvml(String),
}

impl From<TelemetryError> for bench_core::Error {
    fn from(err: TelemetryError) -> Self {
        bench_core::Error::telemetry(err.to_string())
    }
}
