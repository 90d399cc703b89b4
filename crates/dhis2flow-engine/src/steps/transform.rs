use super::{input_table, table_result, Step, StepContext, StepResult};
use crate::error::StepError;
use crate::pipeline::StepConfig;
use crate::table::{cell_to_string, Table};
use async_trait::async_trait;
use serde_json::Value;

/// Reshapes an upstream table.
///
/// Operations run in a fixed order: `filter` (column equals value), `rename`
/// (old to new), `select` (keep and reorder columns), `drop_null_rows`.
/// With no operations configured the input passes through unchanged.
pub struct TransformStep {
    config: StepConfig,
}

impl TransformStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    fn check_object(&self, key: &str) -> Result<(), StepError> {
        match self.config.params.get(key) {
            None | Some(Value::Object(_)) => Ok(()),
            Some(_) => Err(StepError::invalid(&self.config.name, key, "expected a mapping")),
        }
    }

    fn apply(&self, mut table: Table) -> Result<Table, String> {
        if let Some(Value::Object(filters)) = self.config.params.get("filter") {
            for (column, expected) in filters {
                let idx = table
                    .column_index(column)
                    .ok_or_else(|| format!("filter column '{column}' not found"))?;
                let expected = cell_to_string(expected);
                table.retain_rows(|row| cell_to_string(&row[idx]) == expected);
            }
        }

        if let Some(Value::Object(renames)) = self.config.params.get("rename") {
            for (from, to) in renames {
                let to = cell_to_string(to);
                if !table.rename_column(from, &to) {
                    return Err(format!("rename column '{from}' not found"));
                }
            }
        }

        let select = self.config.param_list("select");
        if !select.is_empty() {
            table = table
                .select(&select)
                .map_err(|missing| format!("select column '{missing}' not found"))?;
        }

        if self.config.param_bool("drop_null_rows").unwrap_or(false) {
            table.retain_rows(|row| row.iter().all(|v| !v.is_null()));
        }

        Ok(table)
    }
}

#[async_trait]
impl Step for TransformStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        self.check_object("rename")?;
        self.check_object("filter")
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        ctx.check_cancelled()?;
        let table = match input_table(&self.config, ctx) {
            Ok(table) => table,
            Err(e) => return Ok(StepResult::failed(e)),
        };
        match self.apply(table) {
            Ok(table) => Ok(table_result(&self.config, table)),
            Err(e) => Ok(StepResult::failed(e)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::client::OfflineClient;
    use crate::steps::test_support::{analytics_table, context};
    use crate::steps::{RunContext, StepPayload};
    use serde_json::json;
    use std::sync::Arc;

    fn upstream() -> RunContext {
        let mut results = RunContext::default();
        results.insert(
            "step1".into(),
            StepResult::success(StepPayload::Table(analytics_table())),
        );
        results
    }

    async fn run(config: StepConfig) -> StepResult {
        let ctx = context(Arc::new(OfflineClient)).with_results(upstream());
        TransformStep::new(config).execute(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_passthrough_from_dependency() {
        let result = run(StepConfig::new("transform", "step2").depends_on(["step1"])).await;
        assert_eq!(result.table().unwrap(), &analytics_table());
    }

    #[tokio::test]
    async fn test_filter_rename_select() {
        let config = StepConfig::new("transform", "step2")
            .with_param("source", "step1")
            .with_param("filter", json!({"ou": "o2"}))
            .with_param("rename", json!({"value": "amount"}))
            .with_param("select", json!(["ou", "amount"]));
        let result = run(config).await;

        let table = result.table().unwrap();
        assert_eq!(table.columns(), ["ou", "amount"]);
        assert_eq!(table.rows(), [vec![json!("o2"), json!("7.5")]]);
    }

    #[tokio::test]
    async fn test_missing_column_fails() {
        let config = StepConfig::new("transform", "step2")
            .depends_on(["step1"])
            .with_param("select", json!(["nope"]));
        let result = run(config).await;
        assert!(!result.is_success());
        assert!(result.error.unwrap().contains("nope"));
    }

    #[tokio::test]
    async fn test_skipped_source_fails() {
        let config = StepConfig::new("transform", "step2").with_param("source", "ghost");
        let result = run(config).await;
        assert!(!result.is_success());
    }

    #[test]
    fn test_rename_must_be_mapping() {
        let step = TransformStep::new(
            StepConfig::new("transform", "t").with_param("rename", json!(["a"])),
        );
        assert!(matches!(step.validate_params(), Err(StepError::InvalidParameter { .. })));
    }
}
