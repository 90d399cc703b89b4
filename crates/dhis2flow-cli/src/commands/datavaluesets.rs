//! `dhis2flow datavaluesets` command implementation

use crate::commands::{connect, connection, print_table_result, run_single};
use crate::error::{CliError, Result};
use colored::Colorize;
use dhis2flow_engine::pipeline::StepConfig;
use dhis2flow_engine::steps::StepPayload;
use std::path::PathBuf;

/// Arguments of `datavaluesets pull`
#[derive(Debug, Clone, Default)]
pub struct PullArgs {
    pub data_set: String,
    pub org_unit: Option<String>,
    pub period: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub children: bool,
    pub out: Option<PathBuf>,
    pub retries: u32,
}

/// Arguments of `datavaluesets push`
#[derive(Debug, Clone)]
pub struct PushArgs {
    pub input: PathBuf,
    pub import_strategy: Option<String>,
    pub dry_run: bool,
}

fn with_optional(step: StepConfig, key: &str, value: Option<&String>) -> StepConfig {
    match value {
        Some(value) => step.with_param(key, value.as_str()),
        None => step,
    }
}

pub fn pull_step(args: &PullArgs) -> Result<StepConfig> {
    if args.period.is_none() && (args.start_date.is_none() || args.end_date.is_none()) {
        return Err(CliError::config(
            "datavaluesets pull needs --period or both --start-date and --end-date",
        ));
    }

    let mut step = StepConfig::new("datavaluesets", "datavaluesets")
        .with_param("action", "pull")
        .with_param("dataSet", args.data_set.as_str())
        .with_retries(args.retries);
    step = with_optional(step, "orgUnit", args.org_unit.as_ref());
    step = with_optional(step, "period", args.period.as_ref());
    step = with_optional(step, "startDate", args.start_date.as_ref());
    step = with_optional(step, "endDate", args.end_date.as_ref());
    if args.children {
        step = step.with_param("children", true);
    }
    if let Some(out) = &args.out {
        step = step.with_output(out.clone());
    }
    Ok(step)
}

pub fn push_step(args: &PushArgs) -> StepConfig {
    let step = StepConfig::new("datavaluesets", "datavaluesets")
        .with_param("action", "push")
        .with_param("dryRun", args.dry_run)
        .with_input(args.input.clone());
    with_optional(step, "importStrategy", args.import_strategy.as_ref())
}

pub async fn pull(url: Option<&str>, args: PullArgs) -> Result<()> {
    let step = pull_step(&args)?;
    let connection = connection(url)?;
    let client = connect(&connection)?;
    let result = run_single(&connection, step, client).await?;
    print_table_result(&result, args.out.as_deref());
    Ok(())
}

pub async fn push(url: Option<&str>, args: PushArgs) -> Result<()> {
    let connection = connection(url)?;
    let client = connect(&connection)?;
    let result = run_single(&connection, push_step(&args), client).await?;

    if let StepPayload::PushAck(ack) = &result.payload {
        let prefix = if args.dry_run { " (dry run)" } else { "" };
        println!(
            "{} Import {}{prefix}: {} imported, {} updated, {} ignored, {} deleted",
            "✓".green(),
            ack.status,
            ack.imported,
            ack.updated,
            ack.ignored,
            ack.deleted
        );
        for conflict in &ack.conflicts {
            println!("  {} {conflict}", "!".yellow());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_needs_period_or_range() {
        let args = PullArgs {
            data_set: "pBOMPrpg1QX".into(),
            start_date: Some("2023-01-01".into()),
            ..PullArgs::default()
        };
        assert!(pull_step(&args).is_err());
    }

    #[test]
    fn test_pull_step_uses_api_parameter_names() {
        let args = PullArgs {
            data_set: "pBOMPrpg1QX".into(),
            org_unit: Some("DiszpKrYNg8".into()),
            period: Some("202301".into()),
            children: true,
            ..PullArgs::default()
        };
        let step = pull_step(&args).unwrap();
        assert_eq!(step.param_str("dataSet").as_deref(), Some("pBOMPrpg1QX"));
        assert_eq!(step.param_str("orgUnit").as_deref(), Some("DiszpKrYNg8"));
        assert_eq!(step.param_str("children").as_deref(), Some("true"));
        assert!(!step.has_param("startDate"));
    }

    #[test]
    fn test_push_step_reads_input() {
        let step = push_step(&PushArgs {
            input: PathBuf::from("values.csv"),
            import_strategy: Some("CREATE".into()),
            dry_run: true,
        });
        assert_eq!(step.input, Some(PathBuf::from("values.csv")));
        assert_eq!(step.param_str("importStrategy").as_deref(), Some("CREATE"));
        assert_eq!(step.param_str("dryRun").as_deref(), Some("true"));
    }
}
