//! Device probes: the sources a sampler reads resource counters from

use crate::{Result, TelemetryError};
use bench_core::{ResourceSnapshot, TelemetryBackend, TelemetryConfig};

use async_trait::async_trait;
use sysinfo::System;
use tracing::{debug, info, warn};

/// Trait defining the interface for device probes
///
/// A probe is initialized once, sampled on every tick of the sampler and shut
/// down once. `sample` never fails as a whole: a metric that cannot be queried
/// is reported as `None` in the returned snapshot.
#[async_trait]
pub trait DeviceProbe: Send {
    /// One-time device library initialization
    async fn initialize(&mut self) -> Result<()>;

    /// Read every metric once
    fn sample(&mut self) -> ResourceSnapshot;

    /// Release device handles. Must be callable from `Drop`.
    fn shutdown(&mut self) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Host CPU load meter backed by `sysinfo`
pub struct CpuMeter {
    system: System,
}

impl CpuMeter {
    pub fn new() -> Self {
        let mut system = System::new();
        // usage is computed between two refreshes; prime the first one
        system.refresh_cpu_usage();
        Self { system }
    }

    /// Global CPU load in percent since the previous read
    pub fn read(&mut self) -> Option<f32> {
        self.system.refresh_cpu_usage();
        if self.system.cpus().is_empty() {
            debug!("No CPUs reported by sysinfo");
            return None;
        }
        Some(self.system.global_cpu_usage())
    }
}

impl Default for CpuMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe for machines without a supported GPU: CPU load only
pub struct HostProbe {
    cpu: CpuMeter,
}

impl HostProbe {
    pub fn new() -> Self {
        Self { cpu: CpuMeter::new() }
    }
}

impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProbe for HostProbe {
    async fn initialize(&mut self) -> Result<()> {
        info!("Initializing host probe (GPU metrics unavailable)");
        Ok(())
    }

    fn sample(&mut self) -> ResourceSnapshot {
        let mut snapshot = ResourceSnapshot::unavailable();
        snapshot.cpu_load = self.cpu.read();
        snapshot
    }

    fn shutdown(&mut self) -> Result<()> {
        debug!("Host probe has no device handles to release");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

/// Create a backend-specific device probe
pub fn create_probe(config: &TelemetryConfig) -> Result<Box<dyn DeviceProbe>> {
    match config.backend {
        #[cfg(feature = "nvml")]
        TelemetryBackend::Nvml => Ok(Box::new(crate::nvml::NvmlProbe::new(config.device_index))),

        TelemetryBackend::Host => Ok(Box::new(HostProbe::new())),

        #[cfg(any(feature = "mock", test))]
        TelemetryBackend::Mock => Ok(Box::new(crate::mock::MockProbe::new())),

        #[allow(unreachable_patterns)]
        _ => {
            warn!("Telemetry backend {} not supported or feature not enabled", config.backend);
            Err(TelemetryError::UnsupportedBackend(config.backend.to_string()))
        }
    }
}
