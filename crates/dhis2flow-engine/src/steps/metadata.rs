use super::{
    has_table_source, input_table, require_params, table_result, Step, StepContext, StepPayload,
    StepResult,
};
use crate::client::{FetchRequest, PushRequest};
use crate::error::StepError;
use crate::pipeline::StepConfig;
use crate::schema::defaults::METADATA;
use async_trait::async_trait;
use tracing::info;

const DEFAULT_FIELDS: &str = "id,name,code,lastUpdated";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Export,
    Import,
}

/// Exports one metadata collection (`type`, e.g. `dataElements`) or imports one from a table
pub struct MetadataStep {
    config: StepConfig,
}

impl MetadataStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    fn action(&self) -> Result<Action, StepError> {
        require_params(&self.config, &["action", "type"])?;
        match self
            .config
            .param_str("action")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "export" => Ok(Action::Export),
            "import" => Ok(Action::Import),
            other => Err(StepError::invalid(
                &self.config.name,
                "action",
                format!("expected 'export' or 'import', got '{other}'"),
            )),
        }
    }

    fn collection(&self) -> String {
        self.config.param_str("type").unwrap_or_default()
    }
}

#[async_trait]
impl Step for MetadataStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        match self.action()? {
            Action::Import if !has_table_source(&self.config) => {
                Err(StepError::missing(&self.config.name, "input"))
            },
            _ => Ok(()),
        }
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        let action = self.action()?;
        ctx.check_cancelled()?;
        let collection = self.collection();

        match action {
            Action::Export => {
                let fields = self
                    .config
                    .param_str("fields")
                    .unwrap_or_else(|| DEFAULT_FIELDS.to_string());
                let mut request = FetchRequest::new(METADATA, ctx.version)
                    .param(collection.as_str(), "true")
                    .param("fields", fields);
                if let Some(filter) = self.config.param_str("filter") {
                    request = request.param("filter", filter);
                }

                let page = match ctx.client.fetch(&request).await {
                    Ok(page) => page,
                    Err(e) => return Ok(StepResult::failed(e)),
                };
                let mut table = page.table;
                if let Some(schema) = ctx.schemas.get_schema(METADATA, ctx.version) {
                    table = schema.map_table(&table, ctx.version);
                }
                info!(step = %self.config.name, collection = %collection, rows = table.len(), "Exported metadata");
                Ok(table_result(&self.config, table))
            },
            Action::Import => {
                let mut table = match input_table(&self.config, ctx) {
                    Ok(table) => table,
                    Err(e) => return Ok(StepResult::failed(e)),
                };
                if let Some(schema) = ctx.schemas.get_schema(METADATA, ctx.version) {
                    table = schema.unmap_table(&table, ctx.version);
                }

                let strategy = self
                    .config
                    .param_str("importStrategy")
                    .unwrap_or_else(|| "CREATE_AND_UPDATE".to_string());
                let request = PushRequest::new(METADATA, table, ctx.version)
                    .param("type", collection)
                    .param("importStrategy", strategy);

                match ctx.client.push(&request).await {
                    Ok(ack) if ack.is_error() => Ok(StepResult::failed(format!(
                        "metadata import rejected: {}",
                        ack.conflicts.join("; ")
                    ))),
                    Ok(ack) => Ok(StepResult::success(StepPayload::PushAck(ack))),
                    Err(e) => Ok(StepResult::failed(e)),
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::steps::test_support::{context, FixedClient};
    use std::sync::Arc;

    #[test]
    fn test_requires_action_then_type() {
        let step = MetadataStep::new(StepConfig::new("metadata", "md"));
        assert_eq!(step.validate_params().unwrap_err(), StepError::missing("md", "action"));

        let step = MetadataStep::new(StepConfig::new("metadata", "md").with_param("action", "export"));
        assert_eq!(step.validate_params().unwrap_err(), StepError::missing("md", "type"));
    }

    #[test]
    fn test_import_requires_input() {
        let step = MetadataStep::new(
            StepConfig::new("metadata", "md")
                .with_param("action", "import")
                .with_param("type", "dataElements"),
        );
        assert_eq!(step.validate_params().unwrap_err(), StepError::missing("md", "input"));
    }

    #[tokio::test]
    async fn test_export_requests_collection() {
        let client = Arc::new(FixedClient::default());
        let step = MetadataStep::new(
            StepConfig::new("metadata", "md")
                .with_param("action", "export")
                .with_param("type", "dataElements"),
        );
        let result = step.execute(&context(client.clone())).await.unwrap();
        assert!(result.is_success());

        let fetches = client.fetches.lock().unwrap();
        assert_eq!(fetches[0].endpoint, "metadata");
        assert_eq!(fetches[0].get("dataElements"), Some("true"));
        assert_eq!(fetches[0].get("fields"), Some(DEFAULT_FIELDS));
    }
}
