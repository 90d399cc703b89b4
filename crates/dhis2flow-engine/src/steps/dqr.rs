use super::{has_table_source, input_table, json_result, Step, StepContext, StepPayload, StepResult};
use crate::dqr::{analyze, Metric, DEFAULT_THRESHOLD};
use crate::error::StepError;
use crate::pipeline::StepConfig;
use async_trait::async_trait;
use tracing::info;

/// Data-quality review over an input table
pub struct DqrStep {
    config: StepConfig,
}

impl DqrStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    fn metrics(&self) -> Result<Vec<Metric>, StepError> {
        let names = self.config.param_list("metrics");
        if names.is_empty() {
            return Err(StepError::missing(&self.config.name, "metrics"));
        }
        names
            .iter()
            .map(|name| {
                name.parse::<Metric>()
                    .map_err(|reason| StepError::invalid(&self.config.name, "metrics", reason))
            })
            .collect()
    }

    fn threshold(&self) -> Result<f64, StepError> {
        if !self.config.params.contains_key("threshold") {
            return Ok(DEFAULT_THRESHOLD);
        }
        match self.config.param_f64("threshold") {
            Some(t) if (0.0..=1.0).contains(&t) => Ok(t),
            _ => Err(StepError::invalid(
                &self.config.name,
                "threshold",
                "expected a number between 0 and 1",
            )),
        }
    }
}

#[async_trait]
impl Step for DqrStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        if !has_table_source(&self.config) {
            return Err(StepError::missing(&self.config.name, "input"));
        }
        self.metrics()?;
        self.threshold()?;
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        let metrics = self.metrics()?;
        let threshold = self.threshold()?;
        ctx.check_cancelled()?;

        let table = match input_table(&self.config, ctx) {
            Ok(table) => table,
            Err(e) => return Ok(StepResult::failed(e)),
        };

        let report = analyze(&table, &metrics, threshold);
        info!(
            step = %self.config.name,
            rows = report.rows,
            passed = report.passed(),
            "Data quality review complete"
        );

        if self.config.param_bool("fail_below_threshold").unwrap_or(false) && !report.passed() {
            let failing: Vec<String> = report
                .failing()
                .map(|m| format!("{} {:.3} < {threshold}", m.metric, m.score))
                .collect();
            return Ok(StepResult::failed(format!(
                "quality below threshold: {}",
                failing.join(", ")
            )));
        }

        Ok(json_result(&self.config, &report, StepPayload::Dqr(report.clone())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::artifact::write_table;
    use crate::client::OfflineClient;
    use crate::steps::test_support::{analytics_table, context};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_requires_input_before_metrics() {
        let step = DqrStep::new(StepConfig::new("dqr", "check"));
        assert_eq!(step.validate_params().unwrap_err(), StepError::missing("check", "input"));

        let step = DqrStep::new(StepConfig::new("dqr", "check").with_input("in.csv"));
        assert_eq!(step.validate_params().unwrap_err(), StepError::missing("check", "metrics"));

        let step = DqrStep::new(
            StepConfig::new("dqr", "check")
                .with_input("in.csv")
                .with_param("metrics", json!([])),
        );
        assert_eq!(step.validate_params().unwrap_err(), StepError::missing("check", "metrics"));
    }

    #[test]
    fn test_unknown_metric_and_bad_threshold() {
        let step = DqrStep::new(
            StepConfig::new("dqr", "check")
                .with_input("in.csv")
                .with_param("metrics", json!(["completeness", "timeliness"])),
        );
        assert!(matches!(step.validate_params(), Err(StepError::InvalidParameter { .. })));

        let step = DqrStep::new(
            StepConfig::new("dqr", "check")
                .with_input("in.csv")
                .with_param("metrics", json!(["completeness"]))
                .with_param("threshold", 1.5),
        );
        assert!(matches!(step.validate_params(), Err(StepError::InvalidParameter { .. })));
    }

    #[tokio::test]
    async fn test_analyzes_input_file_and_writes_report() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("values.csv");
        let output = dir.path().join("dqr.json");
        write_table(&input, &analytics_table()).unwrap();

        let step = DqrStep::new(
            StepConfig::new("dqr", "check")
                .with_input(&input)
                .with_output(&output)
                .with_param("metrics", json!(["completeness", "uniqueness"])),
        );
        step.validate_params().unwrap();

        let result = step.execute(&context(Arc::new(OfflineClient))).await.unwrap();
        assert!(result.is_success());
        let StepPayload::Dqr(report) = &result.payload else {
            panic!("expected a DQR payload");
        };
        assert_eq!(report.rows, 2);
        assert!(report.passed());
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_missing_input_file_is_failed_result() {
        let step = DqrStep::new(
            StepConfig::new("dqr", "check")
                .with_input("/nonexistent/values.csv")
                .with_param("metrics", "completeness"),
        );
        let result = step.execute(&context(Arc::new(OfflineClient))).await.unwrap();
        assert!(!result.is_success());
    }
}
