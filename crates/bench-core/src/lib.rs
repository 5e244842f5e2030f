//! # bench-core
//!
//! Core types, traits, and utilities for haystack-bench - a resource-aware
//! benchmark orchestrator for remote vision inference services.
//!
//! This crate provides the foundational data structures and interfaces that are
//! shared across the other haystack-bench components. It includes:
//!
//! - The benchmark data model (resource snapshots, resolution classes, result rows)
//! - The remote predictor trait implemented by inference clients
//! - Layered configuration schema and parsing utilities
//! - Error handling types and utilities

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::{
    BatchingConfig, BenchConfig, CorpusConfig, LoggingConfig, PredictorConfig, ResolutionSpec,
    TelemetryBackend, TelemetryConfig,
};
pub use error::{Error, ErrorContext, Result};
pub use traits::{Prediction, Predictor};
pub use types::{
    image_name, ModelId, ResolutionClass, ResolutionFolder, ResourceSnapshot, ResultRow, RowOutcome,
};

/// Number of bytes in a mebibyte, used for per-image memory estimates.
pub const MIB: u64 = 1024 * 1024;
