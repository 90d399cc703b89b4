//! In-memory tabular data passed between steps
//!
//! Remote responses, artifacts on disk and upstream step results all normalize
//! into a [`Table`]: named columns plus rows of JSON values. Every row has
//! exactly one cell per column.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column-named rows of JSON cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Create a table from rows, padding short rows with nulls and truncating long ones
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Build a table from JSON objects.
    ///
    /// Columns are the union of keys in first-seen order; missing keys become null.
    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Iterate over the cells of one column
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Value> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    /// Append rows from another table, aligning columns by name.
    ///
    /// Columns only present in `other` are added to this table.
    pub fn append(&mut self, other: Table) {
        if self.columns.is_empty() && self.rows.is_empty() {
            *self = other;
            return;
        }

        for column in &other.columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
            }
        }

        let positions: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        for row in other.rows {
            let mut aligned = vec![Value::Null; self.columns.len()];
            for (value, &pos) in row.into_iter().zip(&positions) {
                aligned[pos] = value;
            }
            self.rows.push(aligned);
        }
    }

    /// Rename a column; returns false when `from` does not exist
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.columns[idx] = to.to_string();
                true
            },
            None => false,
        }
    }

    /// Project onto a subset of columns, in the requested order.
    ///
    /// Returns the first missing column name on failure.
    pub fn select(&self, columns: &[String]) -> Result<Table, String> {
        let indices = columns
            .iter()
            .map(|c| self.column_index(c).ok_or_else(|| c.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(Table {
            columns: columns.to_vec(),
            rows,
        })
    }

    /// Apply `f` to every cell of a column
    pub fn map_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        true
    }

    /// Keep only the rows matching `predicate`
    pub fn retain_rows<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| predicate(row));
    }

    /// Convert rows back into JSON objects
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect::<Map<String, Value>>()
            })
            .collect()
    }
}

/// Render a cell as plain text (null becomes the empty string)
pub fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(
            ["dx", "pe", "value"],
            vec![
                vec![json!("d1"), json!("2024Q1"), json!(10)],
                vec![json!("d2"), json!("2024Q1")],
            ],
        )
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = sample();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1][2], Value::Null);
    }

    #[test]
    fn test_from_records_unions_columns() {
        let records = vec![
            json!({"a": 1}).as_object().cloned().unwrap(),
            json!({"a": 2, "b": "x"}).as_object().cloned().unwrap(),
        ];
        let table = Table::from_records(&records);
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.rows()[0], vec![json!(1), Value::Null]);
    }

    #[test]
    fn test_append_aligns_columns() {
        let mut table = sample();
        let other = Table::from_rows(["value", "ou"], vec![vec![json!(5), json!("o1")]]);
        table.append(other);

        assert_eq!(table.columns(), ["dx", "pe", "value", "ou"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[2], vec![Value::Null, Value::Null, json!(5), json!("o1")]);
        assert_eq!(table.rows()[0][3], Value::Null);
    }

    #[test]
    fn test_select_reports_missing_column() {
        let table = sample();
        let projected = table.select(&["value".into(), "dx".into()]).unwrap();
        assert_eq!(projected.columns(), ["value", "dx"]);
        assert_eq!(projected.rows()[0], vec![json!(10), json!("d1")]);

        assert_eq!(table.select(&["nope".into()]).unwrap_err(), "nope");
    }

    #[test]
    fn test_records_round_trip_preserves_cells() {
        let table = sample();
        let records = table.to_records();
        assert_eq!(records[0]["dx"], json!("d1"));
        assert_eq!(Table::from_records(&records).len(), 2);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Value::Null), "");
        assert_eq!(cell_to_string(&json!("abc")), "abc");
        assert_eq!(cell_to_string(&json!(1.5)), "1.5");
    }
}
