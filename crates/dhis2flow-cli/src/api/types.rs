//! DHIS2 wire types and their conversion into engine tables

use dhis2flow_engine::client::{ClientError, Page, Pager, PushAck};
use dhis2flow_engine::table::Table;
use serde::Deserialize;
use serde_json::{Map, Value};

fn decode<T: for<'de> Deserialize<'de>>(body: Value) -> Result<T, ClientError> {
    serde_json::from_value(body).map_err(|e| ClientError::Decode(e.to_string()))
}

// ============================================================================
// System info
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub version: String,
    #[serde(default)]
    pub revision: Option<String>,
}

pub fn decode_system_info(body: Value) -> Result<SystemInfo, ClientError> {
    decode(body)
}

// ============================================================================
// Analytics grid
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GridHeader {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsGrid {
    pub headers: Vec<GridHeader>,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

pub fn decode_analytics(body: Value) -> Result<Page, ClientError> {
    let grid: AnalyticsGrid = decode(body)?;
    let columns = grid.headers.into_iter().map(|h| h.name);
    Ok(Page::single(Table::from_rows(columns, grid.rows)))
}

// ============================================================================
// Data value sets
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataValueSet {
    #[serde(default)]
    pub data_values: Vec<Map<String, Value>>,
}

pub fn decode_data_values(body: Value) -> Result<Page, ClientError> {
    let set: DataValueSet = decode(body)?;
    Ok(Page::single(Table::from_records(&set.data_values)))
}

// ============================================================================
// Tracker events
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePager {
    page: u32,
    page_size: u32,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
}

/// Newer servers return `instances` with paging fields at the top level;
/// older ones return `events` with a nested `pager`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackerEvents {
    #[serde(default)]
    instances: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    events: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    pager: Option<WirePager>,
}

pub fn decode_tracker_events(body: Value) -> Result<Page, ClientError> {
    let events: TrackerEvents = decode(body)?;
    let records = events.instances.or(events.events).unwrap_or_default();

    let pager = match (events.pager, events.page, events.page_size) {
        (Some(p), _, _) => Some(Pager {
            page: p.page,
            page_size: p.page_size,
            page_count: p.page_count,
            total: p.total,
        }),
        (None, Some(page), Some(page_size)) => Some(Pager {
            page,
            page_size,
            page_count: events.page_count,
            total: events.total,
        }),
        _ => None,
    };

    Ok(Page {
        table: Table::from_records(&records),
        pager,
    })
}

// ============================================================================
// Metadata
// ============================================================================

/// Pick the requested collection out of a `/api/metadata` response.
///
/// `requested` lists candidate collection names in request order; when none
/// is present the first array in the response is used.
pub fn decode_metadata(body: Value, requested: &[&str]) -> Result<Page, ClientError> {
    let Value::Object(object) = body else {
        return Err(ClientError::Decode("metadata response is not an object".into()));
    };

    let collection = requested
        .iter()
        .find_map(|name| object.get(*name))
        .or_else(|| {
            object
                .iter()
                .filter(|(key, _)| key.as_str() != "system")
                .map(|(_, v)| v)
                .find(|v| v.is_array())
        });

    let records: Vec<Map<String, Value>> = match collection {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_object().cloned())
            .collect(),
        Some(_) => return Err(ClientError::Decode("metadata collection is not an array".into())),
        None => Vec::new(),
    };
    Ok(Page::single(Table::from_records(&records)))
}

// ============================================================================
// Import summaries
// ============================================================================

fn count(counts: Option<&Value>, keys: &[&str]) -> u64 {
    counts
        .and_then(|c| keys.iter().find_map(|k| c.get(*k)))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Decode a data value or metadata import summary.
///
/// Servers from 2.38 wrap the summary in `response`; metadata imports report
/// `stats` with `created` instead of `importCount` with `imported`.
pub fn decode_import_summary(body: &Value) -> PushAck {
    let summary = body
        .get("response")
        .filter(|r| r.is_object())
        .unwrap_or(body);

    let status = summary
        .get("status")
        .or_else(|| body.get("status"))
        .and_then(Value::as_str)
        .unwrap_or("UNKNOWN")
        .to_string();

    let counts = summary.get("importCount").or_else(|| summary.get("stats"));
    let conflicts = summary
        .get("conflicts")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|c| {
                    let object = c.get("object").and_then(Value::as_str).unwrap_or("?");
                    let value = c.get("value").and_then(Value::as_str).unwrap_or("");
                    format!("{object}: {value}")
                })
                .collect()
        })
        .unwrap_or_default();

    PushAck {
        status,
        imported: count(counts, &["imported", "created"]),
        updated: count(counts, &["updated"]),
        ignored: count(counts, &["ignored"]),
        deleted: count(counts, &["deleted"]),
        conflicts,
    }
}
