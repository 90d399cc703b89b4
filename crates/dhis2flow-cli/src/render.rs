//! Terminal rendering of tables and run reports

use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use dhis2flow_engine::dqr::DqrReport;
use dhis2flow_engine::executor::{RunReport, StepStatus};
use dhis2flow_engine::table::{cell_to_string, Table as DataTable};

/// Rows shown when previewing a table
pub const PREVIEW_ROWS: usize = 10;

fn styled_table(header: Vec<String>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}

/// First `limit` rows of a data table
pub fn table_preview(data: &DataTable, limit: usize) -> String {
    let mut table = styled_table(data.columns().to_vec());
    for row in data.rows().iter().take(limit) {
        table.add_row(row.iter().map(cell_to_string).collect::<Vec<_>>());
    }

    let mut out = table.to_string();
    if data.len() > limit {
        out.push_str(&format!("\n... {} more row(s)", data.len() - limit));
    }
    out
}

fn status_cell(status: StepStatus) -> Cell {
    let color = match status {
        StepStatus::Succeeded => Color::Green,
        StepStatus::Failed => Color::Red,
        StepStatus::Skipped => Color::Yellow,
        _ => Color::Grey,
    };
    Cell::new(status.as_str()).fg(color)
}

/// Per-step summary of a run
pub fn report_table(report: &RunReport) -> String {
    let mut table = styled_table(
        ["Step", "Type", "Status", "Attempts", "Duration", "Detail"]
            .map(String::from)
            .to_vec(),
    );
    for step in &report.steps {
        table.add_row(vec![
            Cell::new(&step.name),
            Cell::new(&step.step_type),
            status_cell(step.status),
            Cell::new(step.attempts),
            Cell::new(
                step.duration_ms
                    .map(|ms| format!("{:.2}s", ms as f64 / 1000.0))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(step.detail()),
        ]);
    }
    table.to_string()
}

/// One-line outcome of a run
pub fn report_headline(report: &RunReport) -> String {
    let counts = format!(
        "{} succeeded, {} failed, {} skipped in {:.2}s",
        report.count(StepStatus::Succeeded),
        report.count(StepStatus::Failed),
        report.count(StepStatus::Skipped),
        report.duration_ms as f64 / 1000.0
    );
    if report.is_success() {
        format!("{} Pipeline '{}' completed: {counts}", "✓".green(), report.pipeline)
    } else {
        let aborted = report
            .aborted
            .map(|reason| format!(" ({reason})"))
            .unwrap_or_default();
        format!("{} Pipeline '{}' failed{aborted}: {counts}", "✗".red(), report.pipeline)
    }
}

/// Scores of a data quality review, one row per metric
pub fn dqr_table(report: &DqrReport) -> String {
    let mut table = styled_table(["Metric", "Score", "Result"].map(String::from).to_vec());
    for metric in &report.metrics {
        let (label, color) = if metric.passed {
            ("pass", Color::Green)
        } else {
            ("below threshold", Color::Red)
        };
        table.add_row(vec![
            Cell::new(metric.metric.as_str()),
            Cell::new(format!("{:.3}", metric.score)),
            Cell::new(label).fg(color),
        ]);
    }
    table.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preview_truncates() {
        let rows = (0..12).map(|i| vec![json!(i), json!(null)]).collect();
        let data = DataTable::from_rows(["n", "empty"], rows);
        let out = table_preview(&data, 3);
        assert!(out.contains("... 9 more row(s)"));
        assert!(out.contains('n'));
    }

    #[test]
    fn test_dqr_table_marks_failures() {
        use dhis2flow_engine::dqr::{analyze, Metric};

        let data = DataTable::from_rows(["a"], vec![vec![json!(1)], vec![json!(null)]]);
        let report = analyze(&data, &[Metric::Completeness], 0.9);
        let out = dqr_table(&report);
        assert!(out.contains("completeness"));
        assert!(out.contains("0.500"));
        assert!(out.contains("below threshold"));
    }
}
