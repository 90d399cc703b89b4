//! Reading and writing step artifacts on the local filesystem
//!
//! The format follows the file extension: `.csv` and `.json` are supported,
//! `.parquet` is recognized but rejected.

use crate::table::{cell_to_string, Table};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("IO error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("JSON error on '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported artifact format '{format}' for '{}'", path.display())]
    Unsupported { path: PathBuf, format: String },

    #[error("Malformed artifact '{}': {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// On-disk artifact formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Csv,
    Json,
}

impl ArtifactFormat {
    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Result<Self, ArtifactError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(ArtifactError::Unsupported {
                path: path.to_path_buf(),
                format: if other.is_empty() {
                    "<none>".to_string()
                } else {
                    other.to_string()
                },
            }),
        }
    }
}

/// Load a table from a CSV or JSON artifact
pub fn read_table(path: &Path) -> Result<Table, ArtifactError> {
    let table = match ArtifactFormat::from_path(path)? {
        ArtifactFormat::Csv => read_csv(path)?,
        ArtifactFormat::Json => read_json(path)?,
    };
    debug!(path = %path.display(), rows = table.len(), "Loaded artifact");
    Ok(table)
}

/// Write a table as CSV or JSON, creating parent directories as needed
pub fn write_table(path: &Path, table: &Table) -> Result<(), ArtifactError> {
    let format = ArtifactFormat::from_path(path)?;
    ensure_parent(path)?;
    match format {
        ArtifactFormat::Csv => write_csv(path, table)?,
        ArtifactFormat::Json => write_json(path, &table.to_records())?,
    }
    debug!(path = %path.display(), rows = table.len(), "Wrote artifact");
    Ok(())
}

/// Write any serializable value as pretty JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), ArtifactError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                path: parent.to_path_buf(),
                source,
            })
        },
        _ => Ok(()),
    }
}

fn read_csv(path: &Path) -> Result<Table, ArtifactError> {
    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut table = Table::new(headers);
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        table.push_row(record.iter().map(parse_cell).collect());
    }
    Ok(table)
}

/// CSV cells are untyped; recover numbers and nulls
fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

fn write_csv(path: &Path, table: &Table) -> Result<(), ArtifactError> {
    let csv_err = |source| ArtifactError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(table.columns()).map_err(csv_err)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(cell_to_string))
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Table, ArtifactError> {
    let content = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let malformed = |reason: &str| ArtifactError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    // Either a bare array of records or a serialized Table
    match value {
        Value::Array(items) => {
            let records = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map),
                    _ => Err(malformed("expected an array of objects")),
                })
                .collect::<Result<Vec<Map<String, Value>>, _>>()?;
            Ok(Table::from_records(&records))
        },
        Value::Object(_) => serde_json::from_value::<Table>(value)
            .map_err(|_| malformed("expected an array of objects or a {columns, rows} table")),
        _ => Err(malformed("expected an array of objects")),
    }
}
