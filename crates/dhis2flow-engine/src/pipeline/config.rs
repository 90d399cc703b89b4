use super::step::{seconds_to_duration, timeout_problem, Params, StepConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::executor::RateGate;
use crate::steps::StepRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_rps() -> f64 {
    8.0
}

fn default_concurrency() -> usize {
    8
}

/// A declarative extraction workflow.
///
/// Immutable once loaded; the executor only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default = "default_version")]
    pub version: String,

    /// Aggregate remote request rate shared by every step
    #[serde(default = "default_rps")]
    pub rps: f64,

    /// Maximum number of steps running at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Whole-run budget in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    #[serde(default)]
    pub steps: Vec<StepConfig>,

    #[serde(default)]
    pub metadata: Params,
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>, steps: Vec<StepConfig>) -> Self {
        Self {
            name: name.into(),
            description: None,
            version: default_version(),
            rps: default_rps(),
            concurrency: default_concurrency(),
            timeout: None,
            steps,
            metadata: Params::new(),
        }
    }

    pub fn with_rps(mut self, rps: f64) -> Self {
        self.rps = rps;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Load a pipeline definition, choosing JSON or YAML by extension
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        debug!(
            path = %path.display(),
            pipeline = %config.name,
            steps = config.steps.len(),
            "Loaded pipeline definition"
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> PipelineResult<Self> {
        serde_yaml::from_str(content).map_err(|e| PipelineError::Parse(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> PipelineResult<Self> {
        serde_json::from_str(content).map_err(|e| PipelineError::Parse(e.to_string()))
    }

    pub fn to_yaml(&self) -> PipelineResult<String> {
        serde_yaml::to_string(self).map_err(|e| PipelineError::Parse(e.to_string()))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_step_by_name(&self, name: &str) -> Option<&StepConfig> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        seconds_to_duration(self.timeout)
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// One error per (step, dependency) pair naming a step that does not exist
    pub fn validate_dependencies(&self) -> Vec<String> {
        let names: HashSet<&str> = self.steps.iter().map(|s| s.name.as_str()).collect();
        self.steps
            .iter()
            .flat_map(|step| {
                step.depends_on
                    .iter()
                    .filter(|dep| !names.contains(dep.as_str()))
                    .map(move |dep| {
                        format!("Step '{}' depends on non-existent step '{}'", step.name, dep)
                    })
            })
            .collect()
    }

    /// Every structural problem that prevents the pipeline from running
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Pipeline name must not be empty".to_string());
        }
        if !self.rps.is_finite() || self.rps <= 0.0 {
            errors.push(format!("rps must be a positive number, got {}", self.rps));
        } else if RateGate::refill_period(self.rps).is_none() {
            errors.push(format!("rps is too small, got {}", self.rps));
        }
        if self.concurrency == 0 {
            errors.push("concurrency must be at least 1".to_string());
        }
        if let Some(problem) = self.timeout.and_then(timeout_problem) {
            errors.push(format!("Pipeline timeout {problem}"));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                errors.push(format!("A step of type '{}' has an empty name", step.step_type));
            } else if !seen.insert(step.name.as_str()) {
                errors.push(format!("Duplicate step name '{}'", step.name));
            }
            if step.depends_on.iter().any(|d| d == &step.name) {
                errors.push(format!("Step '{}' depends on itself", step.name));
            }
            if let Some(problem) = step.timeout.and_then(timeout_problem) {
                errors.push(format!("Step '{}' timeout {problem}", step.name));
            }
        }

        errors.extend(self.validate_dependencies());
        errors
    }

    /// Steps whose type the registry cannot instantiate
    pub fn validate_step_types(&self, registry: &StepRegistry) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| !registry.contains(&s.step_type))
            .map(|s| format!("Step '{}' has unknown type '{}'", s.name, s.step_type))
            .collect()
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Topological order of step names.
    ///
    /// Each pass schedules every step whose dependencies were all ordered in
    /// earlier passes, in declaration order. A pass that schedules nothing
    /// while steps remain means a cycle or an unresolved dependency.
    pub fn get_execution_order(&self) -> PipelineResult<Vec<String>> {
        let mut ordered: Vec<String> = Vec::with_capacity(self.steps.len());
        let mut done: HashSet<&str> = HashSet::new();
        let mut remaining: Vec<&StepConfig> = self.steps.iter().collect();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&StepConfig>, Vec<&StepConfig>) = remaining
                .into_iter()
                .partition(|s| s.depends_on.iter().all(|d| done.contains(d.as_str())));

            if ready.is_empty() {
                return Err(PipelineError::Cycle {
                    remaining: blocked.iter().map(|s| s.name.clone()).collect(),
                });
            }

            for step in ready {
                if done.insert(step.name.as_str()) {
                    ordered.push(step.name.clone());
                }
            }
            remaining = blocked;
        }

        Ok(ordered)
    }
}
