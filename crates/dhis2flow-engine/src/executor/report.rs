use crate::steps::StepResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Lifecycle of one step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Ready => "ready",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Why a run stopped scheduling early
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AbortReason {
    Timeout,
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "pipeline timeout exceeded"),
            AbortReason::Cancelled => write!(f, "pipeline cancelled"),
        }
    }
}

/// Terminal state of one step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub name: String,
    pub step_type: String,
    pub status: StepStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Last result the step produced, successful or not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<StepResult>,
    /// Failure or skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StepReport {
    /// Payload summary or reason, whichever describes the outcome
    pub fn detail(&self) -> String {
        match (&self.reason, &self.result) {
            (Some(reason), _) => reason.clone(),
            (None, Some(result)) => result.payload.summary(),
            (None, None) => String::new(),
        }
    }
}

/// Structured summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub pipeline: String,
    pub status: PipelineStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<AbortReason>,
    /// One entry per step, in execution order
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    pub fn step(&self, name: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.status == StepStatus::Failed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::steps::StepPayload;
    use crate::table::Table;

    fn report() -> RunReport {
        RunReport {
            run_id: Uuid::nil(),
            pipeline: "p".into(),
            status: PipelineStatus::Failed,
            started_at: Utc::now(),
            duration_ms: 12,
            aborted: None,
            steps: vec![
                StepReport {
                    name: "a".into(),
                    step_type: "analytics".into(),
                    status: StepStatus::Succeeded,
                    attempts: 1,
                    started_at: Some(Utc::now()),
                    duration_ms: Some(5),
                    result: Some(StepResult::success(StepPayload::Table(Table::new(["x"])))),
                    reason: None,
                },
                StepReport {
                    name: "b".into(),
                    step_type: "transform".into(),
                    status: StepStatus::Failed,
                    attempts: 3,
                    started_at: None,
                    duration_ms: None,
                    result: None,
                    reason: Some("failed after 3 attempts: boom".into()),
                },
            ],
        }
    }

    #[test]
    fn test_queries() {
        let report = report();
        assert!(!report.is_success());
        assert_eq!(report.count(StepStatus::Failed), 1);
        assert_eq!(report.failed_steps().next().unwrap().name, "b");
        assert_eq!(report.step("a").unwrap().detail(), "0 rows x 1 columns");
        assert!(report.step("b").unwrap().detail().contains("boom"));
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["steps"][0]["status"], "succeeded");
        assert_eq!(json["steps"][0]["result"]["payload"]["kind"], "table");
        assert!(json.get("aborted").is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(StepStatus::Skipped.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
    }
}
