//! Engine error types
//!
//! [`PipelineError`] aborts a run before any step is scheduled.
//! [`StepError`] is contained to a single step: the executor records it in the
//! run report and keeps scheduling independent branches.

use crate::artifact::ArtifactError;
use crate::client::ClientError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline-level operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors that prevent a pipeline from running at all
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline configuration: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Circular or unresolved dependency among steps: {}", remaining.join(", "))]
    Cycle { remaining: Vec<String> },

    #[error("Failed to read pipeline definition '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse pipeline definition: {0}")]
    Parse(String),
}

/// Errors raised while instantiating or executing a single step
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Step '{step}' missing required parameter: {param}")]
    MissingParameter { step: String, param: String },

    #[error("Step '{step}' has invalid parameter '{param}': {reason}")]
    InvalidParameter {
        step: String,
        param: String,
        reason: String,
    },

    #[error("Unknown step type: {0}")]
    UnknownStepType(String),

    #[error("{0}")]
    Execution(String),

    #[error("Remote call failed: {0}")]
    Client(#[from] ClientError),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Step timed out after {0:?}")]
    Timeout(Duration),

    #[error("Step panicked: {0}")]
    Panicked(String),

    #[error("Step cancelled")]
    Cancelled,
}

impl StepError {
    pub fn missing(step: &str, param: &str) -> Self {
        StepError::MissingParameter {
            step: step.to_string(),
            param: param.to_string(),
        }
    }

    pub fn invalid(step: &str, param: &str, reason: impl Into<String>) -> Self {
        StepError::InvalidParameter {
            step: step.to_string(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Contract violations and cancellation are final.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            StepError::MissingParameter { .. }
                | StepError::InvalidParameter { .. }
                | StepError::UnknownStepType(_)
                | StepError::Cancelled
        )
    }
}

impl From<ArtifactError> for StepError {
    fn from(err: ArtifactError) -> Self {
        StepError::Artifact(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_parameter_names_param() {
        let err = StepError::missing("fetch", "ou");
        assert_eq!(err.to_string(), "Step 'fetch' missing required parameter: ou");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StepError::Execution("boom".into()).is_retryable());
        assert!(StepError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(StepError::Panicked("oops".into()).is_retryable());
        assert!(!StepError::missing("a", "b").is_retryable());
        assert!(!StepError::UnknownStepType("nope".into()).is_retryable());
        assert!(!StepError::Cancelled.is_retryable());
    }

    #[test]
    fn test_validation_message_joins_errors() {
        let err = PipelineError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Invalid pipeline configuration: a; b");
    }
}
