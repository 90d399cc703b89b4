//! Declarative pipelines loaded from disk and run end to end

mod common;

use common::MockClient;
use dhis2flow_engine::artifact::read_table;
use dhis2flow_engine::executor::StepStatus;
use dhis2flow_engine::pipeline::PipelineConfig;
use dhis2flow_engine::steps::{StepPayload, StepRegistry};
use dhis2flow_engine::{PipelineError, PipelineExecutor};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn monthly_extract(out: &Path) -> String {
    let out = out.display();
    format!(
        r#"
name: monthly-extract
description: Pull, reshape, export and review
rps: 100
concurrency: 4
timeout: 30
metadata:
  owner: hmis-team
steps:
  - type: analytics
    name: pull
    retry_count: 2
    params:
      dx: d1
      ou: o1
      pe: "2023"
  - type: transform
    name: reshape
    depends_on: [pull]
    params:
      rename:
        value: amount
      select: [dx, ou, amount]
  - type: export
    name: save
    depends_on: [reshape]
    output: "{out}/reshaped.csv"
  - type: dqr
    name: review
    depends_on: [save]
    input: "{out}/reshaped.csv"
    output: "{out}/dqr.json"
    params:
      metrics: [completeness, uniqueness]
      threshold: 0.8
  - type: datavaluesets
    name: archive
    enabled: false
    params:
      action: pull
      dataSet: ds1
"#
    )
}

#[test]
fn test_yaml_definition_loads_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.yaml");
    std::fs::write(&path, monthly_extract(dir.path())).unwrap();

    let config = PipelineConfig::from_path(&path).unwrap();
    assert_eq!(config.name, "monthly-extract");
    assert_eq!(config.version, "1.0.0");
    assert_eq!(config.rps, 100.0);
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.metadata["owner"], "hmis-team");
    assert!(config.validate().is_empty());

    let pull = config.get_step_by_name("pull").unwrap();
    assert_eq!(pull.retry_count, 2);
    assert!(pull.enabled);
    assert!(!config.get_step_by_name("archive").unwrap().enabled);

    assert_eq!(
        config.get_execution_order().unwrap(),
        ["pull", "archive", "reshape", "save", "review"]
    );
}

#[tokio::test]
async fn test_yaml_pipeline_runs_end_to_end() {
    let dir = TempDir::new().unwrap();
    let config = PipelineConfig::from_yaml_str(&monthly_extract(dir.path())).unwrap();
    let client = Arc::new(MockClient::new());

    let report = PipelineExecutor::new(config, client.clone())
        .run()
        .await
        .unwrap();
    assert!(report.is_success(), "{report:#?}");
    assert_eq!(report.step("archive").unwrap().status, StepStatus::Skipped);
    assert_eq!(report.count(StepStatus::Succeeded), 4);

    let written = read_table(&dir.path().join("reshaped.csv")).unwrap();
    assert_eq!(written.columns(), ["dx", "ou", "amount"]);
    assert_eq!(written.len(), 2);

    let review = report.step("review").unwrap().result.as_ref().unwrap();
    match &review.payload {
        StepPayload::Dqr(dqr) => {
            assert!(dqr.passed());
            assert_eq!(dqr.rows, 2);
        },
        other => panic!("expected DQR payload, got {other:?}"),
    }
    assert!(dir.path().join("dqr.json").exists());
}

#[test]
fn test_json_definition() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.json");
    std::fs::write(
        &path,
        r#"{
            "name": "tracker-pull",
            "steps": [
                {"type": "tracker", "name": "events", "params": {"program": "p1", "page_size": 100}}
            ]
        }"#,
    )
    .unwrap();

    let config = PipelineConfig::from_path(&path).unwrap();
    assert_eq!(config.steps.len(), 1);
    assert_eq!(config.steps[0].step_type, "tracker");
    assert_eq!(config.steps[0].param_u64("page_size"), Some(100));
}

#[test]
fn test_unknown_type_detected_when_validating_types() {
    let config = PipelineConfig::from_yaml_str(
        "name: p\nsteps:\n  - {type: analytics, name: a}\n  - {type: teleport, name: b}\n",
    )
    .unwrap();

    // Structure is fine; only the type lookup notices
    assert!(config.validate().is_empty());
    assert_eq!(
        config.validate_step_types(&StepRegistry::with_defaults()),
        ["Step 'b' has unknown type 'teleport'"]
    );
}

#[test]
fn test_missing_file_is_io_error() {
    let err = PipelineConfig::from_path("/definitely/not/here.yaml").unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
}
