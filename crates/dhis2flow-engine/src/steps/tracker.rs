use super::{passthrough_params, require_params, table_result, Step, StepContext, StepResult};
use crate::client::FetchRequest;
use crate::error::StepError;
use crate::pipeline::StepConfig;
use crate::schema::defaults::TRACKER;
use crate::table::Table;
use async_trait::async_trait;
use tracing::debug;

const ENDPOINT: &str = "tracker/events";
const DEFAULT_PAGE_SIZE: u64 = 50;
const CONSUMED: &[&str] = &["page_size", "max_pages", "raw"];

/// Pages through tracker events for a program
pub struct TrackerStep {
    config: StepConfig,
}

impl TrackerStep {
    pub fn new(config: StepConfig) -> Self {
        Self { config }
    }

    fn page_size(&self) -> Result<u64, StepError> {
        if !self.config.params.contains_key("page_size") {
            return Ok(DEFAULT_PAGE_SIZE);
        }
        match self.config.param_u64("page_size") {
            Some(size) if size > 0 => Ok(size),
            _ => Err(StepError::invalid(
                &self.config.name,
                "page_size",
                "expected a positive integer",
            )),
        }
    }
}

#[async_trait]
impl Step for TrackerStep {
    fn config(&self) -> &StepConfig {
        &self.config
    }

    fn validate_params(&self) -> Result<(), StepError> {
        require_params(&self.config, &["program"])?;
        self.page_size()?;
        Ok(())
    }

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError> {
        require_params(&self.config, &["program"])?;
        let page_size = self.page_size()?;
        let max_pages = self.config.param_u64("max_pages");

        let pagination = ctx.schemas.get_pagination_fields(TRACKER, ctx.version);
        let name_of = |logical: &str, fallback: &str| {
            pagination
                .and_then(|fields| fields.get(logical))
                .cloned()
                .unwrap_or_else(|| fallback.to_string())
        };
        let page_param = name_of("page", "page");
        let size_param = name_of("page_size", "pageSize");
        let total_param = name_of("total_pages", "totalPages");

        let mut table = Table::default();
        let mut page: u64 = 1;
        loop {
            // Cancellation is observed between pages
            ctx.check_cancelled()?;

            let mut request = FetchRequest::new(ENDPOINT, ctx.version)
                .param(page_param.as_str(), page.to_string())
                .param(size_param.as_str(), page_size.to_string())
                .param(total_param.as_str(), "true");
            request
                .params
                .extend(passthrough_params(&self.config, CONSUMED));

            let fetched = match ctx.client.fetch(&request).await {
                Ok(fetched) => fetched,
                Err(e) => return Ok(StepResult::failed(format!("page {page}: {e}"))),
            };
            let rows = fetched.table.len() as u64;
            table.append(fetched.table);
            debug!(step = %self.config.name, page, rows, "Fetched tracker page");

            let more = match fetched.pager.and_then(|p| p.has_next()) {
                Some(more) => more,
                None => rows >= page_size,
            };
            if !more || rows == 0 || max_pages.is_some_and(|max| page >= max) {
                break;
            }
            page += 1;
        }

        if !self.config.param_bool("raw").unwrap_or(false) {
            if let Some(schema) = ctx.schemas.get_schema(TRACKER, ctx.version) {
                table = schema.map_table(&table, ctx.version);
            }
        }
        Ok(table_result(&self.config, table))
    }
}
