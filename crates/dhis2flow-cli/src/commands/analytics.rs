//! `dhis2flow analytics` command implementation

use crate::commands::{connect, connection, print_table_result, run_single};
use crate::error::Result;
use dhis2flow_engine::pipeline::StepConfig;
use std::path::PathBuf;

/// Arguments of `analytics pull`
#[derive(Debug, Clone)]
pub struct PullArgs {
    pub dx: String,
    pub ou: String,
    pub pe: String,
    pub out: Option<PathBuf>,
    pub raw: bool,
    pub retries: u32,
}

/// One `analytics` step for the given dimensions
pub fn step(args: &PullArgs) -> StepConfig {
    let mut step = StepConfig::new("analytics", "analytics")
        .with_param("dx", args.dx.as_str())
        .with_param("ou", args.ou.as_str())
        .with_param("pe", args.pe.as_str())
        .with_param("raw", args.raw)
        .with_retries(args.retries);
    if let Some(out) = &args.out {
        step = step.with_output(out.clone());
    }
    step
}

pub async fn pull(url: Option<&str>, args: PullArgs) -> Result<()> {
    let connection = connection(url)?;
    let client = connect(&connection)?;
    let result = run_single(&connection, step(&args), client).await?;
    print_table_result(&result, args.out.as_deref());
    Ok(())
}
