//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. Endpoint
//! commands build a one-step pipeline and hand it to [`execute`], so they get
//! the same retries, rate limiting and progress output as `pipeline run`.

pub mod analytics;
pub mod config;
pub mod datavaluesets;
pub mod demo;
pub mod dqr;
pub mod metadata;
pub mod pipeline;
pub mod tracker;
pub mod version;

use crate::api::Dhis2Client;
use crate::config::ConnectionConfig;
use crate::error::{CliError, Result};
use crate::progress::{create_step_progress, ProgressSink};
use crate::render;
use colored::Colorize;
use dhis2flow_engine::client::Client;
use dhis2flow_engine::executor::{PipelineExecutor, RunReport, StepStatus};
use dhis2flow_engine::pipeline::{PipelineConfig, StepConfig};
use dhis2flow_engine::steps::StepResult;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Load connection settings, applying the `--url` flag last
pub fn connection(url: Option<&str>) -> Result<ConnectionConfig> {
    Ok(ConnectionConfig::load()?.with_url(url))
}

/// Client for the configured server
pub fn connect(connection: &ConnectionConfig) -> Result<Arc<Dhis2Client>> {
    let client = Dhis2Client::new(connection)?;
    debug!(url = %client.base_url(), "Connected client");
    Ok(Arc::new(client))
}

/// Run a pipeline with a progress bar; Ctrl-C cancels the run
pub async fn execute(config: PipelineConfig, client: Arc<dyn Client>) -> Result<RunReport> {
    let bar = create_step_progress(
        config.steps.len() as u64,
        &format!("Running pipeline '{}'", config.name),
    );
    let sink = Arc::new(ProgressSink::new(bar));
    let executor = PipelineExecutor::new(config, client).with_sink(sink.clone());

    let cancel = executor.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            cancel.cancel();
        }
    });

    let report = executor.run().await;
    interrupt.abort();
    sink.finish();
    Ok(report?)
}

/// Error for a run that did not complete
pub fn ensure_success(report: &RunReport) -> Result<()> {
    if report.is_success() {
        return Ok(());
    }
    Err(CliError::PipelineFailed {
        pipeline: report.pipeline.clone(),
        failed: report.count(StepStatus::Failed),
        aborted: report
            .aborted
            .map(|reason| format!(" ({reason})"))
            .unwrap_or_default(),
    })
}

/// Run one step against the configured server and return its result
pub async fn run_single(
    connection: &ConnectionConfig,
    step: StepConfig,
    client: Arc<dyn Client>,
) -> Result<StepResult> {
    let name = step.name.clone();
    let config = PipelineConfig::new(name.clone(), vec![step]).with_rps(connection.rps);
    let report = execute(config, client).await?;

    let Some(step) = report.step(&name) else {
        return Err(CliError::StepFailed {
            step: name,
            reason: "no report for step".to_string(),
        });
    };
    match (&step.status, &step.result) {
        (StepStatus::Succeeded, Some(result)) => Ok(result.clone()),
        _ => Err(CliError::StepFailed {
            step: name,
            reason: step.detail(),
        }),
    }
}

/// Print a table result: a preview, or where it was written
pub fn print_table_result(result: &StepResult, out: Option<&Path>) {
    let Some(table) = result.table() else {
        println!("{} {}", "✓".green(), result.payload.summary());
        return;
    };
    match out {
        Some(path) => println!(
            "{} Wrote {} row(s) to {}",
            "✓".green(),
            table.len(),
            path.display()
        ),
        None => {
            println!("{}", render::table_preview(table, render::PREVIEW_ROWS));
            println!("{} {} row(s)", "✓".green(), table.len());
        },
    }
}
