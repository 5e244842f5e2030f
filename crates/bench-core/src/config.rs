//! Configuration management for haystack-bench
//!
//! Provides a layered configuration system that supports YAML/JSON files,
//! environment variables, and command-line argument overrides.

use crate::{Error, ModelId, ResolutionClass, Result, MIB};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "HAYSTACK_CONFIG";

/// Prefix for per-key environment overrides (`HAYSTACK__BATCHING__MEMORY_FRACTION=0.5`)
pub const ENV_PREFIX: &str = "HAYSTACK";

/// Main configuration structure for a benchmark run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Image corpus layout
    pub corpus: CorpusConfig,

    /// Models to benchmark, in matrix order
    pub models: Vec<ModelId>,

    /// Remote predictor endpoint
    pub predictor: PredictorConfig,

    /// Batch sizing and dispatch
    pub batching: BatchingConfig,

    /// Telemetry sampling
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl BenchConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest)
    /// 2. Configuration file
    /// 3. Defaults (lowest)
    ///
    /// Command-line overrides are applied by the caller afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Start with defaults
        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
                    builder = builder.add_source(config::File::with_name(&config_path));
                } else {
                    builder = builder
                        .add_source(config::File::with_name("./haystack-bench").required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("models")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let parsed: Self = config.try_deserialize()?;

        parsed.validate()?;

        Ok(parsed)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(Error::config("At least one model must be configured"));
        }

        self.corpus.validate()?;
        self.predictor.validate()?;
        self.batching.validate()?;
        self.telemetry.validate()?;

        Ok(())
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            corpus: CorpusConfig::default(),
            models: vec![
                ModelId::new("microsoft/Florence-2-large-ft"),
                ModelId::new("microsoft/Florence-2-large"),
                ModelId::new("microsoft/Florence-2-base-ft"),
                ModelId::new("microsoft/Florence-2-base"),
            ],
            predictor: PredictorConfig::default(),
            batching: BatchingConfig::default(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// A resolution class and its estimated device-memory cost per image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionSpec {
    pub name: ResolutionClass,
    pub bytes_per_image: u64,
}

impl ResolutionSpec {
    pub fn new(name: impl Into<ResolutionClass>, bytes_per_image: u64) -> Self {
        Self {
            name: name.into(),
            bytes_per_image,
        }
    }
}

/// Image corpus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Root directory holding one subdirectory per resolution class
    pub root: PathBuf,

    /// Resolution classes in matrix order
    pub resolutions: Vec<ResolutionSpec>,

    /// Recognized image extensions, compared case-insensitively
    pub extensions: Vec<String>,
}

impl CorpusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resolutions.is_empty() {
            return Err(Error::config("At least one resolution class must be configured"));
        }

        let mut seen = HashSet::new();
        for spec in &self.resolutions {
            if spec.bytes_per_image == 0 {
                return Err(Error::config(format!(
                    "Resolution {} must have a positive bytes_per_image",
                    spec.name
                )));
            }
            if !seen.insert(&spec.name) {
                return Err(Error::config(format!("Duplicate resolution class: {}", spec.name)));
            }
        }

        if self.extensions.is_empty() {
            return Err(Error::config("At least one image extension must be configured"));
        }

        Ok(())
    }

    /// Resolution class names in matrix order
    pub fn classes(&self) -> Vec<ResolutionClass> {
        self.resolutions.iter().map(|spec| spec.name.clone()).collect()
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./benchmark"),
            resolutions: vec![
                ResolutionSpec::new("720p", 50 * MIB),
                ResolutionSpec::new("1080p", 100 * MIB),
                ResolutionSpec::new("1440p", 200 * MIB),
                ResolutionSpec::new("4k", 400 * MIB),
            ],
            extensions: ["jpg", "jpeg", "png", "webp"]
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

/// Remote predictor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Base URL of the inference service
    pub endpoint: String,

    /// Path prefix of the service's HTTP API
    pub api_prefix: String,

    /// Named endpoint to invoke
    pub api_name: String,

    /// Task identifier sent with every image
    pub task_prompt: String,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.endpoint).map_err(|e| {
            Error::config(format!("Invalid predictor endpoint {}: {}", self.endpoint, e))
        })?;

        if self.api_name.trim().is_empty() {
            return Err(Error::config("Predictor api_name cannot be empty"));
        }

        if self.request_timeout_secs == 0 {
            return Err(Error::config("Request timeout must be > 0"));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7860/".to_string(),
            api_prefix: "/gradio_api".to_string(),
            api_name: "process_image".to_string(),
            task_prompt: "Object Detection".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Batch sizing and dispatch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Fraction of currently free device memory a batch may plan to use
    pub memory_fraction: f64,

    /// Estimate used for resolution classes without a configured cost
    pub default_bytes_per_image: u64,

    /// Issue the calls of one batch concurrently instead of one after another
    pub parallel_dispatch: bool,
}

impl BatchingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.memory_fraction > 0.0 && self.memory_fraction <= 1.0) {
            return Err(Error::config(format!(
                "Memory fraction must be in (0, 1], got {}",
                self.memory_fraction
            )));
        }

        if self.default_bytes_per_image == 0 {
            return Err(Error::config("Default bytes per image must be > 0"));
        }

        Ok(())
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            memory_fraction: 0.8,
            default_bytes_per_image: 100 * MIB,
            parallel_dispatch: false,
        }
    }
}

/// Telemetry backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelemetryBackend {
    /// NVIDIA Management Library
    Nvml,
    /// Host CPU only, no GPU metrics
    Host,
    /// Scripted readings for testing and dry runs
    Mock,
}

impl std::fmt::Display for TelemetryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryBackend::Nvml => write!(f, "nvml"),
            TelemetryBackend::Host => write!(f, "host"),
            TelemetryBackend::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for TelemetryBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nvml" => Ok(TelemetryBackend::Nvml),
            "host" => Ok(TelemetryBackend::Host),
            "mock" => Ok(TelemetryBackend::Mock),
            _ => Err(format!("Unknown telemetry backend: {}", s)),
        }
    }
}

/// Telemetry sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub backend: TelemetryBackend,

    /// Index of the GPU to sample
    pub device_index: u32,

    /// Sampling cadence in seconds
    pub interval_secs: u64,

    /// Render the live stats table on every sample
    pub display: bool,
}

impl TelemetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("Telemetry interval must be greater than zero"));
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            backend: TelemetryBackend::Nvml,
            device_index: 0,
            interval_secs: 5,
            display: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,

    /// Show target in logs
    pub show_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            show_target: false,
        }
    }
}
