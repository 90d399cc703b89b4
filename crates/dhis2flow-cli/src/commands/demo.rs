//! `dhis2flow demo` command implementation
//!
//! `demo quick` writes a small sample table and runs a local pipeline over
//! it, so the engine can be tried without a server.

use crate::commands::{ensure_success, execute};
use crate::error::Result;
use crate::render;
use colored::Colorize;
use dhis2flow_engine::artifact::write_table;
use dhis2flow_engine::client::OfflineClient;
use dhis2flow_engine::pipeline::{PipelineConfig, StepConfig};
use dhis2flow_engine::table::Table;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub const SAMPLE_FILE: &str = "sample_values.csv";
pub const PIPELINE_FILE: &str = "pipeline.yaml";

/// Data values for two facilities, with one missing value and one duplicate
fn sample_table() -> Table {
    let row = |de: &str, pe: &str, ou: &str, value: Option<&str>| {
        vec![json!(de), json!(pe), json!(ou), value.map_or(json!(null), |v| json!(v))]
    };
    Table::from_rows(
        ["dataElement", "period", "orgUnit", "value"],
        vec![
            row("fbfJHSPpUQD", "202301", "DiszpKrYNg8", Some("12")),
            row("fbfJHSPpUQD", "202302", "DiszpKrYNg8", Some("15")),
            row("fbfJHSPpUQD", "202303", "DiszpKrYNg8", None),
            row("fbfJHSPpUQD", "202301", "jNb63DIHuwU", Some("9")),
            row("fbfJHSPpUQD", "202302", "jNb63DIHuwU", Some("11")),
            row("fbfJHSPpUQD", "202302", "jNb63DIHuwU", Some("11")),
        ],
    )
}

/// Three local steps: reshape the sample, review it, save the result
pub fn quick_pipeline(dir: &Path) -> PipelineConfig {
    PipelineConfig::new(
        "demo-quick",
        vec![
            StepConfig::new("transform", "reshape")
                .with_input(dir.join(SAMPLE_FILE))
                .with_param("rename", json!({ "value": "amount" })),
            StepConfig::new("dqr", "review")
                .depends_on(["reshape"])
                .with_param("metrics", json!(["completeness", "uniqueness"]))
                .with_param("threshold", 0.8)
                .with_output(dir.join("dqr_report.json")),
            StepConfig::new("export", "save")
                .depends_on(["reshape"])
                .with_output(dir.join("clean_values.csv")),
        ],
    )
}

pub async fn quick(dir: PathBuf) -> Result<()> {
    std::fs::create_dir_all(&dir)?;
    write_table(&dir.join(SAMPLE_FILE), &sample_table())?;

    let config = quick_pipeline(&dir);
    std::fs::write(dir.join(PIPELINE_FILE), config.to_yaml()?)?;
    info!(dir = %dir.display(), "Prepared demo pipeline");

    let report = execute(config, Arc::new(OfflineClient)).await?;
    println!("{}", render::report_table(&report));
    println!("{}", render::report_headline(&report));
    println!(
        "{} Demo files are in {} (re-run with 'dhis2flow pipeline run --offline --config {}')",
        "✓".green(),
        dir.display(),
        dir.join(PIPELINE_FILE).display()
    );

    ensure_success(&report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dhis2flow_engine::artifact::read_table;
    use dhis2flow_engine::steps::StepRegistry;
    use tempfile::TempDir;

    #[test]
    fn test_quick_pipeline_is_valid() {
        let config = quick_pipeline(Path::new("demo"));
        assert!(config.validate().is_empty());
        assert!(config.validate_step_types(&StepRegistry::with_defaults()).is_empty());
        assert_eq!(config.get_execution_order().unwrap(), ["reshape", "review", "save"]);
    }

    #[tokio::test]
    async fn test_quick_runs_offline() {
        let dir = TempDir::new().unwrap();
        quick(dir.path().to_path_buf()).await.unwrap();

        let saved = read_table(&dir.path().join("clean_values.csv")).unwrap();
        assert_eq!(saved.len(), 6);
        assert!(saved.column_index("amount").is_some());
        assert!(dir.path().join("dqr_report.json").exists());

        let reloaded = PipelineConfig::from_path(dir.path().join(PIPELINE_FILE)).unwrap();
        assert_eq!(reloaded.steps.len(), 3);
    }
}
