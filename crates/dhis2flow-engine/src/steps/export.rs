use super::{has_table_source, input_table, Step, StepContext, StepPayload, StepResult};
use crate::artifact::write_table;
use crate::error::StepError;
use crate::pipeline::StepConfig;
use async_trait::async_trait;
use tracing::info;

/// Writes an upstream table to `output`
pub struct ExportStep {
    config: StepConfig,
}

impl ExportStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Step for ExportStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        if !has_table_source(&self.config) {
            return Err(StepError::missing(&self.config.name, "input"));
        }
        if self.config.output.is_none() {
            return Err(StepError::missing(&self.config.name, "output"));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        let Some(path) = self.config.output.clone() else {
            return Err(StepError::missing(&self.config.name, "output"));
        };
        ctx.check_cancelled()?;

        let table = match input_table(&self.config, ctx) {
            Ok(table) => table,
            Err(e) => return Ok(StepResult::failed(e)),
        };
        if let Err(e) = write_table(&path, &table) {
            return Ok(StepResult::failed(e));
        }

        info!(step = %self.config.name, rows = table.len(), path = %path.display(), "Exported table");
        Ok(StepResult::success(StepPayload::Exported {
            rows: table.len(),
            path: path.clone(),
        })
        .with_output(path))
    }
}
