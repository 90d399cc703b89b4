use super::{
    has_table_source, input_table, passthrough_params, require_params, table_result, Step,
    StepContext, StepPayload, StepResult,
};
use crate::client::{FetchRequest, PushRequest};
use crate::error::StepError;
use crate::pipeline::StepConfig;
use crate::schema::defaults::DATA_VALUE_SETS;
use async_trait::async_trait;
use tracing::{debug, info};

const ENDPOINT: &str = "dataValueSets";
const CONSUMED: &[&str] = &["action", "source", "raw"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Pull,
    Push,
}

/// Pulls data values for a data set, or pushes a table of data values
pub struct DataValueSetsStep {
    config: StepConfig,
}

impl DataValueSetsStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    fn action(&self) -> Result<Action, StepError> {
        require_params(&self.config, &["action"])?;
        match self
            .config
            .param_str("action")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "pull" => Ok(Action::Pull),
            "push" => Ok(Action::Push),
            other => Err(StepError::invalid(
                &self.config.name,
                "action",
                format!("expected 'pull' or 'push', got '{other}'"),
            )),
        }
    }

    async fn pull(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        let mut request = FetchRequest::new(ENDPOINT, ctx.version);
        request
            .params
            .extend(passthrough_params(&self.config, CONSUMED));

        let page = match ctx.client.fetch(&request).await {
            Ok(page) => page,
            Err(e) => return Ok(StepResult::failed(e)),
        };
        let mut table = page.table;
        debug!(step = %self.config.name, rows = table.len(), "Pulled data values");

        if !self.config.param_bool("raw").unwrap_or(false) {
            if let Some(schema) = ctx.schemas.get_schema(DATA_VALUE_SETS, ctx.version) {
                table = schema.map_table(&table, ctx.version);
            }
        }
        Ok(table_result(&self.config, table))
    }

    async fn push(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        let mut table = match input_table(&self.config, ctx) {
            Ok(table) => table,
            Err(e) => return Ok(StepResult::failed(e)),
        };
        // Upstream pulls expose mapped names; the API wants the originals back
        if let Some(schema) = ctx.schemas.get_schema(DATA_VALUE_SETS, ctx.version) {
            table = schema.unmap_table(&table, ctx.version);
        }

        let mut request = PushRequest::new(ENDPOINT, table, ctx.version);
        request
            .params
            .extend(passthrough_params(&self.config, CONSUMED));

        match ctx.client.push(&request).await {
            Ok(ack) if ack.is_error() => Ok(StepResult::failed(format!(
                "import rejected: {}",
                ack.conflicts.join("; ")
            ))),
            Ok(ack) => {
                info!(
                    step = %self.config.name,
                    imported = ack.imported,
                    updated = ack.updated,
                    ignored = ack.ignored,
                    "Pushed data values"
                );
                Ok(StepResult::success(StepPayload::PushAck(ack)))
            },
            Err(e) => Ok(StepResult::failed(e)),
        }
    }
}

#[async_trait]
impl Step for DataValueSetsStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        match self.action()? {
            Action::Pull => {
                if self.config.has_param("dataSet") || self.config.has_param("dataElementGroup") {
                    Ok(())
                } else {
                    Err(StepError::missing(&self.config.name, "dataSet"))
                }
            },
            Action::Push if has_table_source(&self.config) => Ok(()),
            Action::Push => Err(StepError::missing(&self.config.name, "input")),
        }
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        let action = self.action()?;
        ctx.check_cancelled()?;
        match action {
            Action::Pull => self.pull(ctx).await,
            Action::Push => self.push(ctx).await,
        }
    }
}
