//! Step contract and built-in step variants
//!
//! A [`Step`] validates its own parameters and performs one action against
//! the remote [`Client`] or an upstream result. Expected failures (a bad
//! remote response, a missing upstream table) come back as a failed
//! [`StepResult`]; `Err` is reserved for contract violations, timeouts and
//! cancellation.

mod analytics;
mod datavaluesets;
mod dqr;
mod export;
mod metadata;
mod registry;
mod tracker;
mod transform;

pub use analytics::AnalyticsStep;
pub use datavaluesets::DataValueSetsStep;
pub use dqr::DqrStep;
pub use export::ExportStep;
pub use metadata::MetadataStep;
pub use registry::{StepFactory, StepRegistry};
pub use tracker::TrackerStep;
pub use transform::TransformStep;

use crate::artifact::{read_table, write_json, write_table};
use crate::client::{Client, PushAck};
use crate::dqr::DqrReport;
use crate::error::StepError;
use crate::pipeline::StepConfig;
use crate::schema::{RemoteVersion, SchemaManager};
use crate::table::Table;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
}

/// Variant-specific result data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepPayload {
    None,
    Table(Table),
    PushAck(PushAck),
    Dqr(DqrReport),
    Exported { rows: usize, path: PathBuf },
}

impl StepPayload {
    /// One-line description for reports
    pub fn summary(&self) -> String {
        match self {
            StepPayload::None => "-".to_string(),
            StepPayload::Table(table) => {
                format!("{} rows x {} columns", table.len(), table.columns().len())
            },
            StepPayload::PushAck(ack) => format!(
                "{}: {} imported, {} updated, {} ignored",
                ack.status, ack.imported, ack.updated, ack.ignored
            ),
            StepPayload::Dqr(report) => {
                let failing = report.failing().count();
                if failing == 0 {
                    format!("{} metrics passed", report.metrics.len())
                } else {
                    format!("{failing} of {} metrics below threshold", report.metrics.len())
                }
            },
            StepPayload::Exported { rows, path } => {
                format!("{rows} rows written to {}", path.display())
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub status: ResultStatus,
    pub payload: StepPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl StepResult {
    pub fn success(payload: StepPayload) -> Self {
        Self {
            status: ResultStatus::Success,
            payload,
            error: None,
            output: None,
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            status: ResultStatus::Failed,
            payload: StepPayload::None,
            error: Some(error.to_string()),
            output: None,
        }
    }

    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }

    pub fn table(&self) -> Option<&Table> {
        match &self.payload {
            StepPayload::Table(table) => Some(table),
            _ => None,
        }
    }
}

// ============================================================================
// Execution context
// ============================================================================

/// Results of steps that reached a terminal state, keyed by step name.
///
/// Only the executor writes entries, once per step; steps get a read-only
/// snapshot. Skipped steps have no entry.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    results: HashMap<String, Arc<StepResult>>,
}

impl RunContext {
    pub fn get(&self, step: &str) -> Option<&StepResult> {
        self.results.get(step).map(Arc::as_ref)
    }

    pub fn contains(&self, step: &str) -> bool {
        self.results.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub(crate) fn insert(&mut self, step: String, result: StepResult) {
        self.results.entry(step).or_insert_with(|| Arc::new(result));
    }
}

/// Everything a step may use while executing
#[derive(Clone)]
pub struct StepContext {
    pub client: Arc<dyn Client>,
    pub schemas: Arc<SchemaManager>,
    pub results: RunContext,
    pub version: RemoteVersion,
    pub cancel: CancellationToken,
}

impl StepContext {
    pub fn new(client: Arc<dyn Client>) -> Self {
        Self {
            client,
            schemas: Arc::new(SchemaManager::new()),
            results: RunContext::default(),
            version: RemoteVersion::Unknown,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_version(mut self, version: RemoteVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_results(mut self, results: RunContext) -> Self {
        self.results = results;
        self
    }

    /// Fail fast if the run was cancelled
    pub fn check_cancelled(&self) -> Result<(), StepError> {
        if self.cancel.is_cancelled() {
            Err(StepError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// Step trait
// ============================================================================

#[async_trait]
pub trait Step: Send + Sync {
    fn config(&self) -> &StepConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Check required parameters; reports the first missing one
    fn validate_params(&self) -> Result<(), StepError>;

    async fn execute(&self, ctx: &StepContext) -> Result<StepResult, StepError>;
}

// ============================================================================
// Shared helpers
// ============================================================================

/// First parameter in `keys` that is absent or empty
pub(crate) fn require_params(config: &StepConfig, keys: &[&str]) -> Result<(), StepError> {
    match keys.iter().find(|k| !config.has_param(k)) {
        Some(missing) => Err(StepError::missing(&config.name, missing)),
        None => Ok(()),
    }
}

/// Whether the step has somewhere to read a table from
pub(crate) fn has_table_source(config: &StepConfig) -> bool {
    config.input.is_some() || config.has_param("source") || !config.depends_on.is_empty()
}

/// Resolve the table a step operates on.
///
/// `params.source` names an upstream step; otherwise `input` is read from
/// disk; otherwise the first dependency holding a table is used.
pub(crate) fn input_table(config: &StepConfig, ctx: &StepContext) -> Result<Table, String> {
    if let Some(source) = config.param_str("source") {
        return match ctx.results.get(&source) {
            Some(result) => result
                .table()
                .cloned()
                .ok_or_else(|| format!("upstream step '{source}' produced no table")),
            None => Err(format!("upstream step '{source}' has no result (was it skipped?)")),
        };
    }

    if let Some(path) = &config.input {
        return read_table(path).map_err(|e| e.to_string());
    }

    config
        .depends_on
        .iter()
        .filter_map(|dep| ctx.results.get(dep))
        .find_map(|result| result.table().cloned())
        .ok_or_else(|| "no input table: set 'input', 'params.source' or depend on a step producing a table".to_string())
}

/// Wrap a table result, writing it to `output` when configured
pub(crate) fn table_result(config: &StepConfig, table: Table) -> StepResult {
    match &config.output {
        Some(path) => match write_table(path, &table) {
            Ok(()) => StepResult::success(StepPayload::Table(table)).with_output(path.clone()),
            Err(e) => {
                warn!(step = %config.name, error = %e, "Failed to write step output");
                StepResult::failed(e)
            },
        },
        None => StepResult::success(StepPayload::Table(table)),
    }
}

/// Wrap a serializable payload, writing it as JSON to `output` when configured
pub(crate) fn json_result<T: Serialize>(config: &StepConfig, value: &T, payload: StepPayload) -> StepResult {
    match &config.output {
        Some(path) => match write_json(path, value) {
            Ok(()) => StepResult::success(payload).with_output(path.clone()),
            Err(e) => StepResult::failed(e),
        },
        None => StepResult::success(payload),
    }
}

/// Pass through every parameter not consumed by the step itself
pub(crate) fn passthrough_params<'a>(
    config: &'a StepConfig,
    consumed: &'a [&'a str],
) -> impl Iterator<Item = (String, String)> + 'a {
    config
        .params
        .keys()
        .filter(move |k| !consumed.contains(&k.as_str()))
        .filter_map(move |k| config.param_str(k).map(|v| (k.clone(), v)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_support {
    use super::*;
    use crate::client::{FetchRequest, Page, PushRequest};
    use crate::client::ClientError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Returns a fixed table for every fetch and records requests
    #[derive(Default)]
    pub struct FixedClient {
        pub fetches: Mutex<Vec<FetchRequest>>,
        pub pushes: Mutex<Vec<PushRequest>>,
        pub fail: bool,
    }

    impl FixedClient {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    pub fn analytics_table() -> Table {
        Table::from_rows(
            ["dx", "pe", "ou", "value"],
            vec![
                vec![json!("d1"), json!("2023"), json!("o1"), json!("12")],
                vec![json!("d1"), json!("2023"), json!("o2"), json!("7.5")],
            ],
        )
    }

    #[async_trait]
    impl Client for FixedClient {
        async fn fetch(&self, request: &FetchRequest) -> Result<Page, ClientError> {
            self.fetches.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(ClientError::Http {
                    status: 500,
                    message: "server exploded".into(),
                });
            }
            Ok(Page::single(analytics_table()))
        }

        async fn push(&self, request: &PushRequest) -> Result<PushAck, ClientError> {
            self.pushes.lock().unwrap().push(request.clone());
            Ok(PushAck {
                status: "SUCCESS".into(),
                imported: request.records.len() as u64,
                ..PushAck::default()
            })
        }
    }

    pub fn context(client: Arc<dyn Client>) -> StepContext {
        StepContext::new(client).with_version(RemoteVersion::V2_38)
    }
}
