//! Field mappings and per-version endpoint schemas

use super::version::RemoteVersion;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Logical type a mapped value is coerced to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
    Date,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::String => "string",
            DataType::Integer => "integer",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
        };
        write!(f, "{s}")
    }
}

/// Contract for one field of an endpoint at a given version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Field name as returned by the remote API
    pub source_field: String,

    /// Field name exposed to pipeline consumers
    pub target_field: String,

    #[serde(default)]
    pub data_type: DataType,

    #[serde(default)]
    pub default_value: Option<Value>,

    /// Named transform (`int`, `float`, `str`, `upper`, `lower`, `trim`, `bool`)
    #[serde(default)]
    pub transform_func: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub version_introduced: Option<RemoteVersion>,

    #[serde(default)]
    pub version_deprecated: Option<RemoteVersion>,
}

impl FieldMapping {
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            data_type: DataType::default(),
            default_value: None,
            transform_func: None,
            required: false,
            version_introduced: None,
            version_deprecated: None,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_transform(mut self, func: impl Into<String>) -> Self {
        self.transform_func = Some(func.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn introduced(mut self, version: RemoteVersion) -> Self {
        self.version_introduced = Some(version);
        self
    }

    pub fn deprecated(mut self, version: RemoteVersion) -> Self {
        self.version_deprecated = Some(version);
        self
    }

    /// Whether this field exists at `version`.
    ///
    /// Bounds are only checked for known versions; `Unknown` sees every field.
    pub fn applies_to(&self, version: RemoteVersion) -> bool {
        let Some(rank) = version.rank() else {
            return true;
        };
        if let Some(introduced) = self.version_introduced.and_then(RemoteVersion::rank) {
            if rank < introduced {
                return false;
            }
        }
        if let Some(deprecated) = self.version_deprecated.and_then(RemoteVersion::rank) {
            if rank >= deprecated {
                return false;
            }
        }
        true
    }

    /// Map one raw value: default for nulls, then transform, then type coercion.
    ///
    /// Values that cannot be converted pass through unchanged.
    pub fn apply(&self, value: &Value) -> Value {
        let value = match (value, &self.default_value) {
            (Value::Null, Some(default)) => default.clone(),
            _ => value.clone(),
        };
        if value.is_null() {
            return value;
        }

        let value = match self.transform_func.as_deref() {
            Some(func) => apply_transform(func, value),
            None => value,
        };
        coerce(self.data_type, value)
    }
}

fn apply_transform(func: &str, value: Value) -> Value {
    match func {
        "int" => to_integer(&value).unwrap_or(value),
        "float" => to_number(&value).unwrap_or(value),
        "str" => Value::String(as_text(&value)),
        "upper" => map_str(value, |s| s.to_uppercase()),
        "lower" => map_str(value, |s| s.to_lowercase()),
        "trim" => map_str(value, |s| s.trim().to_string()),
        "bool" => to_boolean(&value).unwrap_or(value),
        other => {
            debug!(transform = other, "Unknown transform, value left unchanged");
            value
        },
    }
}

fn coerce(data_type: DataType, value: Value) -> Value {
    match data_type {
        DataType::String => match value {
            Value::Number(_) | Value::Bool(_) => Value::String(as_text(&value)),
            other => other,
        },
        DataType::Integer => to_integer(&value).unwrap_or(value),
        DataType::Number => to_number(&value).unwrap_or(value),
        DataType::Boolean => to_boolean(&value).unwrap_or(value),
        DataType::Date => value,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn map_str(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(f(&s)),
        other => other,
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n.as_f64().map(|f| Value::from(f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
                .map(Value::from)
        },
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n.as_f64().map(Value::from),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::from),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// How one endpoint's payload looks at one remote version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSchema {
    pub endpoint: String,
    pub version: RemoteVersion,

    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,

    /// Logical pagination name (`page`, `page_size`, `total_pages`) to query parameter name
    #[serde(default)]
    pub pagination_fields: HashMap<String, String>,
}

impl EndpointSchema {
    pub fn new(endpoint: impl Into<String>, version: RemoteVersion) -> Self {
        Self {
            endpoint: endpoint.into(),
            version,
            field_mappings: Vec::new(),
            pagination_fields: HashMap::new(),
        }
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    pub fn with_pagination(mut self, logical: &str, param: &str) -> Self {
        self.pagination_fields
            .insert(logical.to_string(), param.to_string());
        self
    }

    /// First applicable mapping for a source field
    pub fn mapping_for(&self, source_field: &str, version: RemoteVersion) -> Option<&FieldMapping> {
        self.field_mappings
            .iter()
            .find(|m| m.source_field == source_field && m.applies_to(version))
    }

    /// Required source fields missing from a table
    pub fn missing_required(&self, table: &Table, version: RemoteVersion) -> Vec<String> {
        self.field_mappings
            .iter()
            .filter(|m| m.required && m.applies_to(version))
            .filter(|m| table.column_index(&m.source_field).is_none())
            .map(|m| m.source_field.clone())
            .collect()
    }

    /// Rename mapped columns to their target names and map their values.
    ///
    /// Unmapped columns are kept as-is.
    pub fn map_table(&self, table: &Table, version: RemoteVersion) -> Table {
        let mappings: Vec<Option<&FieldMapping>> = table
            .columns()
            .iter()
            .map(|c| self.mapping_for(c, version))
            .collect();

        let columns: Vec<String> = table
            .columns()
            .iter()
            .zip(&mappings)
            .map(|(c, m)| m.map_or_else(|| c.clone(), |m| m.target_field.clone()))
            .collect();

        let rows = table
            .rows()
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&mappings)
                    .map(|(v, m)| m.map_or_else(|| v.clone(), |m| m.apply(v)))
                    .collect()
            })
            .collect();

        Table::from_rows(columns, rows)
    }

    /// Reverse of [`map_table`](Self::map_table) for column names only
    pub fn unmap_table(&self, table: &Table, version: RemoteVersion) -> Table {
        let columns: Vec<String> = table
            .columns()
            .iter()
            .map(|c| {
                self.field_mappings
                    .iter()
                    .find(|m| &m.target_field == c && m.applies_to(version))
                    .map_or_else(|| c.clone(), |m| m.source_field.clone())
            })
            .collect();
        Table::from_rows(columns, table.rows().to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let mapping = FieldMapping::new("dx", "data");
        assert_eq!(mapping.data_type, DataType::String);
        assert!(!mapping.required);
        assert!(mapping.default_value.is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let mapping: FieldMapping = serde_json::from_value(json!({
            "source_field": "value",
            "target_field": "value",
            "data_type": "number",
            "version_introduced": "2.38"
        }))
        .unwrap();
        assert_eq!(mapping.data_type, DataType::Number);
        assert_eq!(mapping.version_introduced, Some(RemoteVersion::V2_38));
        assert!(mapping.transform_func.is_none());
    }

    #[test]
    fn test_applies_to_bounds() {
        let mapping = FieldMapping::new("a", "b")
            .introduced(RemoteVersion::V2_38)
            .deprecated(RemoteVersion::V2_40);

        assert!(!mapping.applies_to(RemoteVersion::V2_37));
        assert!(mapping.applies_to(RemoteVersion::V2_38));
        assert!(mapping.applies_to(RemoteVersion::V2_39));
        assert!(!mapping.applies_to(RemoteVersion::V2_40));
        assert!(mapping.applies_to(RemoteVersion::Unknown));
    }

    #[test]
    fn test_apply_default_transform_and_type() {
        let mapping = FieldMapping::new("value", "value")
            .with_type(DataType::Number)
            .with_default(0);
        assert_eq!(mapping.apply(&Value::Null), json!(0.0));
        assert_eq!(mapping.apply(&json!("12.5")), json!(12.5));
        assert_eq!(mapping.apply(&json!("n/a")), json!("n/a"));

        let upper = FieldMapping::new("ou", "org_unit").with_transform("upper");
        assert_eq!(upper.apply(&json!("abc")), json!("ABC"));

        let int = FieldMapping::new("n", "n").with_transform("int").with_type(DataType::Integer);
        assert_eq!(int.apply(&json!("42")), json!(42));
        assert_eq!(int.apply(&json!(3.9)), json!(3));

        let flag = FieldMapping::new("f", "f").with_type(DataType::Boolean);
        assert_eq!(flag.apply(&json!("true")), json!(true));
        assert_eq!(flag.apply(&json!(0)), json!(false));
    }

    #[test]
    fn test_map_table_renames_and_converts() {
        let schema = EndpointSchema::new("analytics", RemoteVersion::V2_38)
            .with_mapping(FieldMapping::new("dx", "data"))
            .with_mapping(FieldMapping::new("value", "value").with_type(DataType::Number));
        let table = Table::from_rows(
            ["dx", "value", "extra"],
            vec![vec![json!("d1"), json!("3"), json!("x")]],
        );

        let mapped = schema.map_table(&table, RemoteVersion::V2_38);
        assert_eq!(mapped.columns(), ["data", "value", "extra"]);
        assert_eq!(mapped.rows()[0], vec![json!("d1"), json!(3.0), json!("x")]);

        let unmapped = schema.unmap_table(&mapped, RemoteVersion::V2_38);
        assert_eq!(unmapped.columns(), ["dx", "value", "extra"]);
    }

    #[test]
    fn test_missing_required() {
        let schema = EndpointSchema::new("tracker", RemoteVersion::V2_41)
            .with_mapping(FieldMapping::new("event", "event_id").required())
            .with_mapping(FieldMapping::new("program", "program").required());
        let table = Table::new(["event"]);
        assert_eq!(schema.missing_required(&table, RemoteVersion::V2_41), vec!["program"]);
    }
}
