//! Built-in schemas for the endpoints the stock steps talk to

use super::mapping::{DataType, EndpointSchema, FieldMapping};
use super::version::RemoteVersion;

pub const ANALYTICS: &str = "analytics";
pub const DATA_VALUE_SETS: &str = "datavaluesets";
pub const TRACKER: &str = "tracker";
pub const METADATA: &str = "metadata";

/// Every schema a fresh [`SchemaManager`](super::SchemaManager) starts with
pub fn default_schemas() -> Vec<EndpointSchema> {
    vec![
        analytics(RemoteVersion::V2_36),
        analytics(RemoteVersion::V2_38),
        data_value_sets(RemoteVersion::V2_36),
        data_value_sets(RemoteVersion::V2_38),
        tracker_v2_36(),
        tracker_v2_41(),
        metadata(RemoteVersion::V2_36),
    ]
}

fn analytics(version: RemoteVersion) -> EndpointSchema {
    let schema = EndpointSchema::new(ANALYTICS, version)
        .with_mapping(FieldMapping::new("dx", "data").required())
        .with_mapping(FieldMapping::new("pe", "period").required())
        .with_mapping(FieldMapping::new("ou", "org_unit").required())
        .with_mapping(FieldMapping::new("value", "value").with_type(DataType::Number))
        .with_pagination("page", "page")
        .with_pagination("page_size", "pageSize")
        .with_pagination("total_pages", "totalPages");

    // 2.38 added the category option combo column to the analytics grid
    if version >= RemoteVersion::V2_38 {
        schema.with_mapping(
            FieldMapping::new("co", "category_option_combo").introduced(RemoteVersion::V2_38),
        )
    } else {
        schema
    }
}

fn data_value_sets(version: RemoteVersion) -> EndpointSchema {
    let schema = EndpointSchema::new(DATA_VALUE_SETS, version)
        .with_mapping(FieldMapping::new("dataElement", "data_element").required())
        .with_mapping(FieldMapping::new("period", "period").required())
        .with_mapping(FieldMapping::new("orgUnit", "org_unit").required())
        .with_mapping(FieldMapping::new("categoryOptionCombo", "category_option_combo"))
        .with_mapping(FieldMapping::new("attributeOptionCombo", "attribute_option_combo"))
        .with_mapping(FieldMapping::new("value", "value"))
        .with_mapping(FieldMapping::new("storedBy", "stored_by"))
        .with_mapping(FieldMapping::new("lastUpdated", "last_updated").with_type(DataType::Date))
        .with_mapping(
            FieldMapping::new("followup", "followup")
                .with_type(DataType::Boolean)
                .with_default(false),
        );

    if version >= RemoteVersion::V2_38 {
        schema.with_mapping(
            FieldMapping::new("created", "created").with_type(DataType::Date).introduced(RemoteVersion::V2_38),
        )
    } else {
        schema
    }
}

fn tracker_v2_36() -> EndpointSchema {
    EndpointSchema::new(TRACKER, RemoteVersion::V2_36)
        .with_mapping(FieldMapping::new("event", "event_id").required())
        .with_mapping(FieldMapping::new("program", "program").required())
        .with_mapping(FieldMapping::new("programStage", "program_stage"))
        .with_mapping(FieldMapping::new("orgUnit", "org_unit"))
        .with_mapping(FieldMapping::new("eventDate", "occurred_at").with_type(DataType::Date))
        .with_mapping(FieldMapping::new("status", "status").with_transform("upper"))
        .with_pagination("page", "page")
        .with_pagination("page_size", "pageSize")
        .with_pagination("total_pages", "totalPages")
}

fn tracker_v2_41() -> EndpointSchema {
    // The new tracker API renamed eventDate and the paging flag
    EndpointSchema::new(TRACKER, RemoteVersion::V2_41)
        .with_mapping(FieldMapping::new("event", "event_id").required())
        .with_mapping(FieldMapping::new("program", "program").required())
        .with_mapping(FieldMapping::new("programStage", "program_stage"))
        .with_mapping(FieldMapping::new("orgUnit", "org_unit"))
        .with_mapping(FieldMapping::new("occurredAt", "occurred_at").with_type(DataType::Date))
        .with_mapping(FieldMapping::new("status", "status").with_transform("upper"))
        .with_pagination("page", "page")
        .with_pagination("page_size", "pageSize")
        .with_pagination("total_pages", "totalPages")
}

fn metadata(version: RemoteVersion) -> EndpointSchema {
    EndpointSchema::new(METADATA, version)
        .with_mapping(FieldMapping::new("id", "id").required())
        .with_mapping(FieldMapping::new("name", "name"))
        .with_mapping(FieldMapping::new("code", "code"))
        .with_mapping(FieldMapping::new("lastUpdated", "last_updated").with_type(DataType::Date))
}
