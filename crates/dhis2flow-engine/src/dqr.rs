//! Data-quality review metrics over tabular data

use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Share of non-empty cells
    Completeness,
    /// Share of distinct rows
    Uniqueness,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Completeness, Metric::Uniqueness];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Completeness => "completeness",
            Metric::Uniqueness => "uniqueness",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completeness" => Ok(Metric::Completeness),
            "uniqueness" => Ok(Metric::Uniqueness),
            other => Err(format!(
                "unknown metric '{other}' (expected one of: {})",
                Metric::ALL.map(Metric::as_str).join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    pub metric: Metric,
    pub score: f64,
    pub passed: bool,
    /// Per-column scores where the metric has them
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub columns: BTreeMap<String, f64>,
}

/// Findings of one review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqrReport {
    pub rows: usize,
    pub columns: usize,
    pub threshold: f64,
    pub metrics: Vec<MetricResult>,
}

impl DqrReport {
    pub fn passed(&self) -> bool {
        self.metrics.iter().all(|m| m.passed)
    }

    pub fn failing(&self) -> impl Iterator<Item = &MetricResult> {
        self.metrics.iter().filter(|m| !m.passed)
    }
}

/// Compute the requested metrics; each passes when its score reaches `threshold`
pub fn analyze(table: &Table, metrics: &[Metric], threshold: f64) -> DqrReport {
    let results = metrics
        .iter()
        .map(|&metric| {
            let (score, columns) = match metric {
                Metric::Completeness => completeness(table),
                Metric::Uniqueness => (uniqueness(table), BTreeMap::new()),
            };
            MetricResult {
                metric,
                score,
                passed: score >= threshold,
                columns,
            }
        })
        .collect();

    DqrReport {
        rows: table.len(),
        columns: table.columns().len(),
        threshold,
        metrics: results,
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// Overall and per-column completeness. An empty table scores 0.
fn completeness(table: &Table) -> (f64, BTreeMap<String, f64>) {
    if table.is_empty() || table.columns().is_empty() {
        let columns = table.columns().iter().map(|c| (c.clone(), 0.0)).collect();
        return (0.0, columns);
    }

    let rows = table.len() as f64;
    let mut present_total = 0usize;
    let mut per_column = BTreeMap::new();

    for column in table.columns() {
        let present = table
            .column(column)
            .map(|cells| cells.filter(|v| is_present(v)).count())
            .unwrap_or(0);
        present_total += present;
        per_column.insert(column.clone(), present as f64 / rows);
    }

    let cells = rows * table.columns().len() as f64;
    (present_total as f64 / cells, per_column)
}

/// Distinct rows over total rows. An empty table scores 1.
fn uniqueness(table: &Table) -> f64 {
    if table.is_empty() {
        return 1.0;
    }
    let distinct: HashSet<String> = table
        .rows()
        .iter()
        .map(|row| Value::Array(row.clone()).to_string())
        .collect();
    distinct.len() as f64 / table.len() as f64
}
