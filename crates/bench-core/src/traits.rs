//! Core traits for haystack-bench components
//!
//! The remote inference service is a black box to the orchestrator: the only
//! thing it depends on is the call signature below and the fact that its
//! latency is the cost being measured.

use crate::{ModelId, Result};
use async_trait::async_trait;
use std::path::Path;

/// Raw result returned by the remote predictor
pub type Prediction = serde_json::Value;

/// A remote predictor that runs one task on one image with one model
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Run `task_prompt` on the image at `image` using `model`
    async fn predict(&self, image: &Path, task_prompt: &str, model: &ModelId) -> Result<Prediction>;

    /// Human-readable description of the predictor endpoint
    fn describe(&self) -> String {
        "remote predictor".to_string()
    }
}
