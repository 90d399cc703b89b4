//! `dhis2flow tracker` command implementation

use crate::commands::{connect, connection, print_table_result, run_single};
use crate::error::{CliError, Result};
use dhis2flow_engine::pipeline::StepConfig;
use std::path::PathBuf;

/// Arguments of `tracker events`
#[derive(Debug, Clone)]
pub struct EventsArgs {
    pub program: String,
    pub org_unit: Option<String>,
    pub status: Option<String>,
    pub page_size: u64,
    pub max_pages: Option<u64>,
    pub out: Option<PathBuf>,
    pub retries: u32,
}

pub fn step(args: &EventsArgs) -> Result<StepConfig> {
    if args.page_size == 0 {
        return Err(CliError::config("--page-size must be at least 1"));
    }

    let mut step = StepConfig::new("tracker", "tracker")
        .with_param("program", args.program.as_str())
        .with_param("page_size", args.page_size)
        .with_retries(args.retries);
    if let Some(org_unit) = &args.org_unit {
        step = step.with_param("orgUnit", org_unit.as_str());
    }
    if let Some(status) = &args.status {
        step = step.with_param("status", status.as_str());
    }
    if let Some(max_pages) = args.max_pages {
        step = step.with_param("max_pages", max_pages);
    }
    if let Some(out) = &args.out {
        step = step.with_output(out.clone());
    }
    Ok(step)
}

pub async fn events(url: Option<&str>, args: EventsArgs) -> Result<()> {
    let step = step(&args)?;
    let connection = connection(url)?;
    let client = connect(&connection)?;
    let result = run_single(&connection, step, client).await?;
    print_table_result(&result, args.out.as_deref());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn args() -> EventsArgs {
        EventsArgs {
            program: "eBAyeGv0exc".into(),
            org_unit: None,
            status: Some("COMPLETED".into()),
            page_size: 100,
            max_pages: Some(3),
            out: None,
            retries: 2,
        }
    }

    #[test]
    fn test_step_paging_params() {
        let step = step(&args()).unwrap();
        assert_eq!(step.param_u64("page_size"), Some(100));
        assert_eq!(step.param_u64("max_pages"), Some(3));
        assert_eq!(step.param_str("status").as_deref(), Some("COMPLETED"));
        assert!(!step.has_param("orgUnit"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut args = args();
        args.page_size = 0;
        assert!(step(&args).is_err());
    }
}
