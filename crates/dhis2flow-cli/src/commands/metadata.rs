//! `dhis2flow metadata` command implementation

use crate::commands::{connect, connection, print_table_result, run_single};
use crate::error::Result;
use colored::Colorize;
use dhis2flow_engine::pipeline::StepConfig;
use dhis2flow_engine::steps::StepPayload;
use std::path::PathBuf;

/// Arguments of `metadata export`
#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub collection: String,
    pub fields: Option<String>,
    pub filter: Option<String>,
    pub out: Option<PathBuf>,
}

/// Arguments of `metadata import`
#[derive(Debug, Clone)]
pub struct ImportArgs {
    pub collection: String,
    pub input: PathBuf,
    pub import_strategy: Option<String>,
}

pub fn export_step(args: &ExportArgs) -> StepConfig {
    let mut step = StepConfig::new("metadata", "metadata")
        .with_param("action", "export")
        .with_param("type", args.collection.as_str());
    if let Some(fields) = &args.fields {
        step = step.with_param("fields", fields.as_str());
    }
    if let Some(filter) = &args.filter {
        step = step.with_param("filter", filter.as_str());
    }
    if let Some(out) = &args.out {
        step = step.with_output(out.clone());
    }
    step
}

pub fn import_step(args: &ImportArgs) -> StepConfig {
    let mut step = StepConfig::new("metadata", "metadata")
        .with_param("action", "import")
        .with_param("type", args.collection.as_str())
        .with_input(args.input.clone());
    if let Some(strategy) = &args.import_strategy {
        step = step.with_param("importStrategy", strategy.as_str());
    }
    step
}

pub async fn export(url: Option<&str>, args: ExportArgs) -> Result<()> {
    let connection = connection(url)?;
    let client = connect(&connection)?;
    let result = run_single(&connection, export_step(&args), client).await?;
    print_table_result(&result, args.out.as_deref());
    Ok(())
}

pub async fn import(url: Option<&str>, args: ImportArgs) -> Result<()> {
    let connection = connection(url)?;
    let client = connect(&connection)?;
    let result = run_single(&connection, import_step(&args), client).await?;
    if let StepPayload::PushAck(ack) = &result.payload {
        println!(
            "{} Imported {}: {} created, {} updated, {} ignored",
            "✓".green(),
            args.collection,
            ack.imported,
            ack.updated,
            ack.ignored
        );
    }
    Ok(())
}
