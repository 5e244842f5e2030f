//! Error handling for haystack-bench
//!
//! Provides a unified error type and result type for use across all benchmark components.

use std::path::PathBuf;

/// Result type alias for haystack-bench operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for haystack-bench
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// The image corpus root directory does not exist
    #[error("Corpus directory not found: {}", .0.display())]
    CorpusNotFound(PathBuf),

    /// The corpus root exists but no resolution folder holds a usable image
    #[error("No populated resolution folders found in {}", .0.display())]
    EmptyCorpus(PathBuf),

    /// Network-related errors talking to the remote predictor
    #[error("Network error: {0}")]
    Network(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The remote predictor reported a failure for a request
    #[error("Prediction failed: {0}")]
    Prediction(String),

    /// The remote predictor answered with something we cannot interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Device telemetry errors
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a prediction error
    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::Prediction(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Create a telemetry error
    pub fn telemetry(msg: impl Into<String>) -> Self {
        Self::Telemetry(msg.into())
    }

    /// Errors that must abort the run before any telemetry or dispatch starts
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self,
            Error::CorpusNotFound(_)
                | Error::EmptyCorpus(_)
                | Error::InvalidConfiguration(_)
                | Error::Config(_)
        )
    }

    /// Get the error category for logging and failure rows
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::CorpusNotFound(_) => "corpus_not_found",
            Error::EmptyCorpus(_) => "empty_corpus",
            Error::Network(_) => "network",
            Error::Timeout(_) => "timeout",
            Error::Prediction(_) => "prediction",
            Error::InvalidResponse(_) => "invalid_response",
            Error::Telemetry(_) => "telemetry",
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

/// Extension trait for adding context to Results
pub trait ErrorContext<T> {
    /// Add context to an error using a closure
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", f(), original_error))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("invalid setting");
        assert!(matches!(err, Error::InvalidConfiguration(_)));
        assert_eq!(err.to_string(), "Configuration error: invalid setting");
    }

    #[test]
    fn test_startup_fatal_classification() {
        assert!(Error::CorpusNotFound(PathBuf::from("./benchmark")).is_startup_fatal());
        assert!(Error::EmptyCorpus(PathBuf::from("./benchmark")).is_startup_fatal());
        assert!(!Error::prediction("boom").is_startup_fatal());
        assert!(!Error::telemetry("no device").is_startup_fatal());
    }

    #[test]
    fn test_corpus_error_display() {
        let err = Error::CorpusNotFound(PathBuf::from("/data/benchmark"));
        assert_eq!(err.to_string(), "Corpus directory not found: /data/benchmark");
        assert_eq!(err.category(), "corpus_not_found");
    }

    #[test]
    fn test_error_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));

        let err = result
            .with_context_fn(|| format!("failed to read {}", "image.png"))
            .unwrap_err();

        assert!(matches!(err, Error::Other(_)));
        assert!(err.to_string().contains("failed to read image.png"));
        assert!(err.to_string().contains("file not found"));
    }
}
