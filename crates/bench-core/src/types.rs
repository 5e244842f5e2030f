//! Core type definitions for haystack-bench

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a model served by the remote predictor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Create a new ModelId from a string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of the ModelId
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModelId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ModelId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Named bucket of images sharing an expected per-image memory cost (e.g. `1080p`)
///
/// The name doubles as the corpus subdirectory holding the class's images.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolutionClass(String);

impl ResolutionClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolutionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResolutionClass {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ResolutionClass {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Point-in-time reading of compute-resource telemetry.
///
/// Every field is best-effort: `None` means the metric could not be queried
/// during the sample that produced this snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    /// Host CPU load in percent
    pub cpu_load: Option<f32>,

    /// GPU utilization in percent
    pub gpu_load: Option<u32>,

    /// GPU core temperature in degrees Celsius
    pub gpu_temperature: Option<u32>,

    /// GPU graphics clock in MHz
    pub gpu_core_clock: Option<u32>,

    /// GPU fan speed in percent
    pub gpu_fan_speed: Option<u32>,

    /// GPU power draw in watts
    pub gpu_power_draw: Option<f64>,

    /// Free GPU memory in bytes
    pub gpu_free_memory: Option<u64>,

    /// When the sample was taken
    pub taken_at: DateTime<Utc>,
}

impl ResourceSnapshot {
    /// Snapshot with every metric unavailable
    pub fn unavailable() -> Self {
        Self {
            cpu_load: None,
            gpu_load: None,
            gpu_temperature: None,
            gpu_core_clock: None,
            gpu_fan_speed: None,
            gpu_power_draw: None,
            gpu_free_memory: None,
            taken_at: Utc::now(),
        }
    }

    /// Builder-style setter for the free GPU memory reading
    pub fn with_gpu_free_memory(mut self, bytes: u64) -> Self {
        self.gpu_free_memory = Some(bytes);
        self
    }

    /// Builder-style setter for the CPU load reading
    pub fn with_cpu_load(mut self, percent: f32) -> Self {
        self.cpu_load = Some(percent);
        self
    }

    /// True when no GPU metric could be read
    pub fn gpu_unavailable(&self) -> bool {
        self.gpu_load.is_none()
            && self.gpu_temperature.is_none()
            && self.gpu_core_clock.is_none()
            && self.gpu_fan_speed.is_none()
            && self.gpu_power_draw.is_none()
            && self.gpu_free_memory.is_none()
    }
}

impl Default for ResourceSnapshot {
    fn default() -> Self {
        Self::unavailable()
    }
}

/// A corpus subdirectory for one resolution class and the images found in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionFolder {
    pub class: ResolutionClass,
    pub path: PathBuf,
    /// Image files, sorted by file name
    pub images: Vec<PathBuf>,
}

impl ResolutionFolder {
    pub fn new(class: ResolutionClass, path: impl Into<PathBuf>, images: Vec<PathBuf>) -> Self {
        Self {
            class,
            path: path.into(),
            images,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }
}

/// Outcome of dispatching a single image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    /// The predictor answered; `elapsed_secs` is the batch wall-clock divided by the batch size
    Completed { elapsed_secs: f64 },
    /// The predictor call failed; no timing is attributed
    Failed { error: String },
}

/// One record per processed image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub model: ModelId,
    pub resolution: ResolutionClass,
    /// Image file name
    pub image: String,
    pub outcome: RowOutcome,
    /// Telemetry observed when the image's batch completed
    pub snapshot: ResourceSnapshot,
}

impl ResultRow {
    /// Per-image elapsed seconds, `None` for failed rows
    pub fn elapsed_secs(&self) -> Option<f64> {
        match self.outcome {
            RowOutcome::Completed { elapsed_secs } => Some(elapsed_secs),
            RowOutcome::Failed { .. } => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RowOutcome::Failed { .. })
    }
}

/// File name of an image reference, falling back to the full path
pub fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
