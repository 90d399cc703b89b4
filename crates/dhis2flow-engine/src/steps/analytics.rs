use super::{passthrough_params, require_params, table_result, Step, StepContext, StepResult};
use crate::client::FetchRequest;
use crate::error::StepError;
use crate::pipeline::StepConfig;
use crate::schema::defaults::ANALYTICS;
use async_trait::async_trait;
use tracing::{debug, warn};

const REQUIRED: &[&str] = &["dx", "ou", "pe"];

/// Parameters that shape the request rather than pass through
const CONSUMED: &[&str] = &["dx", "ou", "pe", "raw"];

/// Pulls an analytics table for data (`dx`), org units (`ou`) and periods (`pe`)
pub struct AnalyticsStep {
    config: StepConfig,
}

impl AnalyticsStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    fn request(&self, ctx: &StepContext) -> FetchRequest {
        let dimension = |key: &str| {
            format!("{key}:{}", self.config.param_str(key).unwrap_or_default())
        };
        let mut request = FetchRequest::new(ANALYTICS, ctx.version)
            .param("dimension", dimension("dx"))
            .param("dimension", dimension("pe"))
            .param("dimension", dimension("ou"));
        request
            .params
            .extend(passthrough_params(&self.config, CONSUMED));
        request
    }
}

#[async_trait]
impl Step for AnalyticsStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        require_params(&self.config, REQUIRED)
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        require_params(&self.config, REQUIRED)?;
        ctx.check_cancelled()?;

        let page = match ctx.client.fetch(&self.request(ctx)).await {
            Ok(page) => page,
            Err(e) => return Ok(StepResult::failed(e)),
        };
        let mut table = page.table;
        debug!(step = %self.config.name, rows = table.len(), "Fetched analytics");

        if !self.config.param_bool("raw").unwrap_or(false) {
            if let Some(schema) = ctx.schemas.get_schema(ANALYTICS, ctx.version) {
                let missing = schema.missing_required(&table, ctx.version);
                if !missing.is_empty() && !table.is_empty() {
                    warn!(step = %self.config.name, ?missing, "Analytics response lacks expected columns");
                }
                table = schema.map_table(&table, ctx.version);
            }
        }

        Ok(table_result(&self.config, table))
    }
}
