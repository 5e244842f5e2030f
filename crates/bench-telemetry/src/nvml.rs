//! NVML (NVIDIA Management Library) backend

use crate::probe::{CpuMeter, DeviceProbe};
use crate::{Result, TelemetryError};
use bench_core::ResourceSnapshot;

use async_trait::async_trait;
use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
use nvml_wrapper::Nvml;
use std::collections::HashSet;
use tracing::{debug, info, warn};

type Query<T> = std::result::Result<T, String>;

/// Raw results of one round of device queries
struct DeviceQueries {
    load: Query<u32>,
    temperature: Query<u32>,
    core_clock: Query<u32>,
    fan_speed: Query<u32>,
    power_mw: Query<u32>,
    free_memory: Query<u64>,
}

impl DeviceQueries {
    fn failed(reason: String) -> Self {
        Self {
            load: Err(reason.clone()),
            temperature: Err(reason.clone()),
            core_clock: Err(reason.clone()),
            fan_speed: Err(reason.clone()),
            power_mw: Err(reason.clone()),
            free_memory: Err(reason),
        }
    }
}

/// NVML device probe
///
/// If the library cannot be loaded the probe keeps running and reports every
/// GPU metric as unavailable.
pub struct NvmlProbe {
    device_index: u32,
    nvml: Option<Nvml>,
    cpu: CpuMeter,
    degraded: HashSet<&'static str>,
}

impl NvmlProbe {
    /// Create a new NVML probe for the GPU at `device_index`
    pub fn new(device_index: u32) -> Self {
        Self {
            device_index,
            nvml: None,
            cpu: CpuMeter::new(),
            degraded: HashSet::new(),
        }
    }

    fn query_device(nvml: &Nvml, index: u32) -> DeviceQueries {
        let device = match nvml.device_by_index(index) {
            Ok(device) => device,
            Err(e) => return DeviceQueries::failed(format!("device {} unavailable: {}", index, e)),
        };

        DeviceQueries {
            load: device.utilization_rates().map(|u| u.gpu).map_err(|e| e.to_string()),
            temperature: device
                .temperature(TemperatureSensor::Gpu)
                .map_err(|e| e.to_string()),
            core_clock: device.clock_info(Clock::Graphics).map_err(|e| e.to_string()),
            fan_speed: device.fan_speed(0).map_err(|e| e.to_string()),
            power_mw: device.power_usage().map_err(|e| e.to_string()),
            free_memory: device.memory_info().map(|m| m.free).map_err(|e| e.to_string()),
        }
    }

    /// Turn a query result into a best-effort reading, logging availability transitions
    fn track<T>(&mut self, metric: &'static str, result: Query<T>) -> Option<T> {
        match result {
            Ok(value) => {
                if self.degraded.remove(metric) {
                    info!("GPU metric {} available again", metric);
                }
                Some(value)
            }
            Err(reason) => {
                debug!("GPU metric {} query failed: {}", metric, reason);
                if self.degraded.insert(metric) {
                    warn!("GPU metric {} unavailable: {}", metric, reason);
                }
                None
            }
        }
    }
}

#[async_trait]
impl DeviceProbe for NvmlProbe {
    async fn initialize(&mut self) -> Result<()> {
        info!("Initializing NVML probe for GPU {}", self.device_index);

        match Nvml::init() {
            Ok(nvml) => {
                match nvml.device_by_index(self.device_index).and_then(|d| d.name()) {
                    Ok(name) => info!("NVML initialized, sampling {}", name),
                    Err(e) => warn!("NVML initialized but GPU {} is not readable: {}", self.device_index, e),
                }
                self.nvml = Some(nvml);
            }
            Err(e) => {
                warn!("NVML unavailable, GPU metrics will be reported as N/A: {}", e);
            }
        }

        Ok(())
    }

    fn sample(&mut self) -> ResourceSnapshot {
        let mut snapshot = ResourceSnapshot::unavailable();
        snapshot.cpu_load = self.cpu.read();

        let queries = match self.nvml.as_ref() {
            Some(nvml) => Self::query_device(nvml, self.device_index),
            None => return snapshot,
        };

        snapshot.gpu_load = self.track("gpu_load", queries.load);
        snapshot.gpu_temperature = self.track("gpu_temperature", queries.temperature);
        snapshot.gpu_core_clock = self.track("gpu_core_clock", queries.core_clock);
        snapshot.gpu_fan_speed = self.track("gpu_fan_speed", queries.fan_speed);
        snapshot.gpu_power_draw = self
            .track("gpu_power_draw", queries.power_mw)
            .map(|mw| f64::from(mw) / 1000.0);
        snapshot.gpu_free_memory = self.track("gpu_free_memory", queries.free_memory);

        snapshot
    }

    fn shutdown(&mut self) -> Result<()> {
        match self.nvml.take() {
            Some(nvml) => {
                info!("Shutting down NVML");
                nvml.shutdown().map_err(|e| TelemetryError::Nvml(e.to_string()))
            }
            None => {
                debug!("NVML was never initialized, nothing to release");
                Ok(())
            }
        }
    }

    fn name(&self) -> &'static str {
        "nvml"
    }
}
