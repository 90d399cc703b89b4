use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Free-form step parameters, interpreted per step type
pub type Params = Map<String, Value>;

fn default_enabled() -> bool {
    true
}

/// One node of the pipeline DAG
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Tag selecting the step implementation
    #[serde(rename = "type")]
    pub step_type: String,

    /// Unique name within the pipeline
    pub name: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Disabled steps are skipped but still satisfy dependents
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-attempt budget in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,

    /// Additional attempts after the first failure
    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub params: Params,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl StepConfig {
    pub fn new(step_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            name: name.into(),
            depends_on: Vec::new(),
            enabled: true,
            timeout: None,
            retry_count: 0,
            params: Params::new(),
            input: None,
            output: None,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.input = Some(path.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Per-attempt timeout, if a positive finite one is configured
    pub fn timeout_duration(&self) -> Option<Duration> {
        seconds_to_duration(self.timeout)
    }

    /// Whether a parameter is present and non-empty
    pub fn has_param(&self, key: &str) -> bool {
        match self.params.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Parameter rendered as a string.
    ///
    /// Lists are joined with `;`, the remote API's dimension item separator.
    pub fn param_str(&self, key: &str) -> Option<String> {
        if !self.has_param(key) {
            return None;
        }
        self.params.get(key).map(|value| match value {
            Value::Array(items) => items.iter().map(scalar_to_string).collect::<Vec<_>>().join(";"),
            other => scalar_to_string(other),
        })
    }

    /// Parameter as a list of strings; a scalar becomes a one-element list
    pub fn param_list(&self, key: &str) -> Vec<String> {
        match self.params.get(key) {
            Some(Value::Array(items)) => items.iter().map(scalar_to_string).collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![scalar_to_string(other)],
        }
    }

    pub fn param_bool(&self, key: &str) -> Option<bool> {
        match self.params.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn param_f64(&self, key: &str) -> Option<f64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        match self.params.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Positive seconds as a duration; anything else means no limit
pub(crate) fn seconds_to_duration(seconds: Option<f64>) -> Option<Duration> {
    seconds
        .filter(|s| *s > 0.0)
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
}

/// Problem with a configured timeout, if any
pub(crate) fn timeout_problem(seconds: f64) -> Option<String> {
    if !seconds.is_finite() || seconds <= 0.0 {
        Some(format!("must be positive, got {seconds}"))
    } else if Duration::try_from_secs_f64(seconds).is_err() {
        Some(format!("is too large, got {seconds}"))
    } else {
        None
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_from_yaml() {
        let step: StepConfig = serde_yaml::from_str("type: analytics\nname: fetch\n").unwrap();
        assert_eq!(step.step_type, "analytics");
        assert!(step.enabled);
        assert_eq!(step.retry_count, 0);
        assert!(step.depends_on.is_empty());
        assert!(step.params.is_empty());
        assert!(step.timeout_duration().is_none());
    }

    #[test]
    fn test_param_helpers() {
        let step = StepConfig::new("analytics", "fetch")
            .with_param("dx", json!(["a", "b"]))
            .with_param("ou", "o1")
            .with_param("year", 2023)
            .with_param("blank", "  ")
            .with_param("skip", "true")
            .with_param("threshold", "0.75");

        assert_eq!(step.param_str("dx").as_deref(), Some("a;b"));
        assert_eq!(step.param_str("year").as_deref(), Some("2023"));
        assert_eq!(step.param_list("ou"), vec!["o1"]);
        assert!(!step.has_param("blank"));
        assert!(!step.has_param("absent"));
        assert_eq!(step.param_bool("skip"), Some(true));
        assert_eq!(step.param_f64("threshold"), Some(0.75));
        assert_eq!(step.param_u64("year"), Some(2023));
    }

    #[test]
    fn test_non_positive_timeout_ignored() {
        assert!(StepConfig::new("x", "y").with_timeout(0.0).timeout_duration().is_none());
        assert!(StepConfig::new("x", "y").with_timeout(1e30).timeout_duration().is_none());
        assert!(StepConfig::new("x", "y").with_timeout(f64::INFINITY).timeout_duration().is_none());
        assert_eq!(
            StepConfig::new("x", "y").with_timeout(1.5).timeout_duration(),
            Some(Duration::from_millis(1500))
        );
    }
}
