//! Mock device probe for testing

use crate::probe::DeviceProbe;
use crate::Result;
use bench_core::{ResourceSnapshot, MIB};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Lifecycle counters shared between a mock probe and the test observing it
#[derive(Debug, Default)]
pub struct ProbeCounters {
    pub initialized: AtomicUsize,
    pub samples: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl ProbeCounters {
    pub fn initialized(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

/// Mock probe returning a scripted snapshot
pub struct MockProbe {
    reading: Arc<Mutex<ResourceSnapshot>>,
    counters: Arc<ProbeCounters>,
}

impl MockProbe {
    /// Create a mock probe with plausible readings for an 8GB card
    pub fn new() -> Self {
        let reading = ResourceSnapshot {
            cpu_load: Some(12.5),
            gpu_load: Some(45),
            gpu_temperature: Some(65),
            gpu_core_clock: Some(1500),
            gpu_fan_speed: Some(60),
            gpu_power_draw: Some(150.0),
            gpu_free_memory: Some(6 * 1024 * MIB),
            taken_at: Utc::now(),
        };

        Self {
            reading: Arc::new(Mutex::new(reading)),
            counters: Arc::new(ProbeCounters::default()),
        }
    }

    /// Replace the scripted reading
    pub fn with_reading(self, reading: ResourceSnapshot) -> Self {
        if let Ok(mut current) = self.reading.lock() {
            *current = reading;
        }
        self
    }

    /// Handle for changing the scripted reading while the probe is running
    pub fn reading_handle(&self) -> Arc<Mutex<ResourceSnapshot>> {
        Arc::clone(&self.reading)
    }

    /// Lifecycle counters for assertions
    pub fn counters(&self) -> Arc<ProbeCounters> {
        Arc::clone(&self.counters)
    }
}

impl Default for MockProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceProbe for MockProbe {
    async fn initialize(&mut self) -> Result<()> {
        info!("Initializing mock probe");
        self.counters.initialized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn sample(&mut self) -> ResourceSnapshot {
        self.counters.samples.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = self
            .reading
            .lock()
            .map(|reading| reading.clone())
            .unwrap_or_default();
        snapshot.taken_at = Utc::now();
        debug!("Mock probe sampled: {:?}", snapshot);
        snapshot
    }

    fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down mock probe");
        self.counters.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
