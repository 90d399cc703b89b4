//! `dhis2flow pipeline` command implementation
//!
//! Runs or checks a declarative pipeline definition.

use crate::commands::{connect, connection, ensure_success, execute};
use crate::error::{CliError, Result};
use crate::render;
use colored::Colorize;
use dhis2flow_engine::artifact::write_json;
use dhis2flow_engine::client::{Client, OfflineClient};
use dhis2flow_engine::pipeline::PipelineConfig;
use dhis2flow_engine::steps::StepRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Arguments of `pipeline run`
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: PathBuf,
    pub report: Option<PathBuf>,
    pub offline: bool,
    pub concurrency: Option<usize>,
    pub rps: Option<f64>,
}

/// Apply command-line overrides to a loaded definition
fn apply_overrides(mut config: PipelineConfig, args: &RunArgs) -> PipelineConfig {
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let Some(rps) = args.rps {
        config = config.with_rps(rps);
    }
    config
}

pub async fn run(url: Option<&str>, args: RunArgs) -> Result<()> {
    let config = apply_overrides(PipelineConfig::from_path(&args.config)?, &args);
    info!(pipeline = %config.name, steps = config.steps.len(), "Loaded pipeline");

    let client: Arc<dyn Client> = if args.offline {
        Arc::new(OfflineClient)
    } else {
        connect(&connection(url)?)?
    };

    let report = execute(config, client).await?;
    println!("{}", render::report_table(&report));
    println!("{}", render::report_headline(&report));

    if let Some(path) = &args.report {
        write_json(path, &report)?;
        println!("{} Report written to {}", "✓".green(), path.display());
    }

    ensure_success(&report)
}

pub async fn validate(path: PathBuf) -> Result<()> {
    let config = PipelineConfig::from_path(&path)?;
    let registry = StepRegistry::with_defaults();

    let mut errors = config.validate();
    errors.extend(config.validate_step_types(&registry));
    if !errors.is_empty() {
        for error in &errors {
            println!("  {} {error}", "✗".red());
        }
        return Err(CliError::Pipeline(
            dhis2flow_engine::PipelineError::Validation(errors),
        ));
    }

    let order = config.get_execution_order()?;
    println!(
        "{} Pipeline '{}' is valid ({} step(s))",
        "✓".green(),
        config.name,
        config.steps.len()
    );
    println!("Execution order: {}", order.join(" -> "));
    Ok(())
}
