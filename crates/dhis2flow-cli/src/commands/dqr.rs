//! `dhis2flow dqr` command implementation
//!
//! Reviews a local table; no server connection is needed.

use crate::error::{CliError, Result};
use crate::render;
use colored::Colorize;
use dhis2flow_engine::artifact::{read_table, write_json};
use dhis2flow_engine::dqr::{analyze as analyze_table, DqrReport, Metric, DEFAULT_THRESHOLD};
use std::path::PathBuf;

/// Arguments of `dqr analyze`
#[derive(Debug, Clone)]
pub struct AnalyzeArgs {
    pub input: PathBuf,
    pub metrics: Vec<String>,
    pub threshold: Option<f64>,
    pub output: Option<PathBuf>,
    pub fail_below_threshold: bool,
}

fn parse_metrics(names: &[String]) -> Result<Vec<Metric>> {
    if names.is_empty() {
        return Err(CliError::config("at least one metric is required"));
    }
    names
        .iter()
        .map(|name| name.parse::<Metric>().map_err(CliError::Config))
        .collect()
}

fn threshold(value: Option<f64>) -> Result<f64> {
    match value {
        None => Ok(DEFAULT_THRESHOLD),
        Some(t) if (0.0..=1.0).contains(&t) => Ok(t),
        Some(t) => Err(CliError::config(format!(
            "threshold must be between 0 and 1, got {t}"
        ))),
    }
}

/// Error listing metrics below the threshold
fn below_threshold(report: &DqrReport) -> CliError {
    CliError::BelowThreshold {
        threshold: report.threshold,
        metrics: report
            .failing()
            .map(|m| format!("{} {:.3}", m.metric, m.score))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

pub async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let metrics = parse_metrics(&args.metrics)?;
    let threshold = threshold(args.threshold)?;
    let table = read_table(&args.input)?;

    let report = analyze_table(&table, &metrics, threshold);
    println!(
        "{} rows x {} columns from {}",
        report.rows,
        report.columns,
        args.input.display()
    );
    println!("{}", render::dqr_table(&report));

    if let Some(output) = &args.output {
        write_json(output, &report)?;
        println!("{} Report written to {}", "✓".green(), output.display());
    }

    if args.fail_below_threshold && !report.passed() {
        return Err(below_threshold(&report));
    }
    Ok(())
}
