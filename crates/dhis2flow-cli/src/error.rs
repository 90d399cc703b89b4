//! Error types for the dhis2flow CLI
//!
//! Every variant is user-facing: the message says what went wrong and, where
//! there is one, what to do about it.

use dhis2flow_engine::artifact::ArtifactError;
use dhis2flow_engine::client::ClientError;
use dhis2flow_engine::PipelineError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// No server URL from flags, environment or config file
    #[error("No DHIS2 connection configured. Run 'dhis2flow config --url <URL>' or set DHIS2_URL.")]
    NotConfigured,

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or config file.")]
    Config(String),

    /// Remote API call failed outside a pipeline step
    #[error("DHIS2 request failed: {0}. Check the server URL and credentials with 'dhis2flow config --show'.")]
    Api(#[from] ClientError),

    /// Pipeline definition could not be loaded or is invalid
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// The run finished but at least one step failed
    #[error("Pipeline '{pipeline}' failed: {failed} step(s) failed{aborted}")]
    PipelineFailed {
        pipeline: String,
        failed: usize,
        aborted: String,
    },

    /// A single-step command did not succeed
    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    /// Data quality below the requested threshold
    #[error("Data quality below threshold {threshold}: {metrics}")]
    BelowThreshold { threshold: f64, metrics: String },

    /// Reading or writing a table artifact failed
    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("Network setup failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Config file has invalid TOML
    #[error("Failed to parse config file: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to write config file: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    /// JSON serialization failed
    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_actionable() {
        assert!(CliError::NotConfigured.to_string().contains("dhis2flow config --url"));
        let err = CliError::PipelineFailed {
            pipeline: "p".into(),
            failed: 2,
            aborted: " (pipeline timeout exceeded)".into(),
        };
        assert_eq!(
            err.to_string(),
            "Pipeline 'p' failed: 2 step(s) failed (pipeline timeout exceeded)"
        );
    }

    #[test]
    fn test_client_error_converts() {
        let err: CliError = ClientError::Offline.into();
        assert!(err.to_string().starts_with("DHIS2 request failed: No remote connection"));
    }
}
