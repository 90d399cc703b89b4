use super::defaults::default_schemas;
use super::mapping::{EndpointSchema, FieldMapping};
use super::version::RemoteVersion;
use std::collections::{BTreeSet, HashMap};

/// Registry of endpoint schemas keyed by (endpoint, version).
///
/// Endpoint names are matched case-insensitively.
#[derive(Debug, Clone)]
pub struct SchemaManager {
    schemas: HashMap<String, HashMap<RemoteVersion, EndpointSchema>>,
}

impl Default for SchemaManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaManager {
    /// Create a manager pre-populated with the built-in schemas
    pub fn new() -> Self {
        let mut manager = Self::empty();
        for schema in default_schemas() {
            let endpoint = schema.endpoint.clone();
            let version = schema.version;
            manager.register_schema(&endpoint, version, schema);
        }
        manager
    }

    /// Create a manager with no schemas at all
    pub fn empty() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Insert or replace the schema for (endpoint, version)
    pub fn register_schema(&mut self, endpoint: &str, version: RemoteVersion, schema: EndpointSchema) {
        self.schemas
            .entry(normalize(endpoint))
            .or_default()
            .insert(version, schema);
    }

    /// Resolve the schema for an endpoint at a version.
    ///
    /// Exact match first, then the closest registered version strictly older
    /// than the requested one. `Unknown` only resolves when registered exactly.
    pub fn get_schema(&self, endpoint: &str, version: RemoteVersion) -> Option<&EndpointSchema> {
        let versions = self.schemas.get(&normalize(endpoint))?;
        if let Some(schema) = versions.get(&version) {
            return Some(schema);
        }

        let wanted = version.rank()?;
        versions
            .iter()
            .filter_map(|(v, schema)| v.rank().map(|rank| (rank, schema)))
            .filter(|(rank, _)| *rank < wanted)
            .max_by_key(|(rank, _)| *rank)
            .map(|(_, schema)| schema)
    }

    /// Applicable mapping for a source field at the resolved schema
    pub fn get_field_mapping(
        &self,
        endpoint: &str,
        field_name: &str,
        version: RemoteVersion,
    ) -> Option<&FieldMapping> {
        self.get_schema(endpoint, version)?
            .mapping_for(field_name, version)
    }

    pub fn get_pagination_fields(
        &self,
        endpoint: &str,
        version: RemoteVersion,
    ) -> Option<&HashMap<String, String>> {
        self.get_schema(endpoint, version)
            .map(|schema| &schema.pagination_fields)
    }

    pub fn list_endpoints(&self) -> BTreeSet<String> {
        self.schemas.keys().cloned().collect()
    }

    /// Registered versions for an endpoint, oldest first (`Unknown` sorts first)
    pub fn list_versions(&self, endpoint: &str) -> Vec<RemoteVersion> {
        let mut versions: Vec<RemoteVersion> = self
            .schemas
            .get(&normalize(endpoint))
            .map(|v| v.keys().copied().collect())
            .unwrap_or_default();
        versions.sort_by_key(|v| v.rank());
        versions
    }

    /// Total number of registered (endpoint, version) pairs
    pub fn len(&self) -> usize {
        self.schemas.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize(endpoint: &str) -> String {
    endpoint.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::schema::defaults::{ANALYTICS, TRACKER};

    #[test]
    fn test_defaults_loaded() {
        let manager = SchemaManager::new();
        let endpoints = manager.list_endpoints();
        for expected in ["analytics", "datavaluesets", "tracker", "metadata"] {
            assert!(endpoints.contains(expected), "missing {expected}");
        }
        assert!(SchemaManager::empty().is_empty());
    }

    #[test]
    fn test_exact_match() {
        let manager = SchemaManager::new();
        let schema = manager.get_schema(ANALYTICS, RemoteVersion::V2_38).unwrap();
        assert_eq!(schema.version, RemoteVersion::V2_38);
    }

    #[test]
    fn test_fallback_to_nearest_earlier() {
        let manager = SchemaManager::new();
        let schema = manager.get_schema(ANALYTICS, RemoteVersion::V2_41).unwrap();
        assert_eq!(schema.version, RemoteVersion::V2_38);

        let schema = manager.get_schema(ANALYTICS, RemoteVersion::V2_37).unwrap();
        assert_eq!(schema.version, RemoteVersion::V2_36);
    }

    #[test]
    fn test_no_earlier_version_is_absent() {
        let mut manager = SchemaManager::empty();
        manager.register_schema(
            "custom",
            RemoteVersion::V2_38,
            EndpointSchema::new("custom", RemoteVersion::V2_38),
        );
        assert!(manager.get_schema("custom", RemoteVersion::V2_36).is_none());
        assert!(manager.get_schema("other", RemoteVersion::V2_38).is_none());
    }

    #[test]
    fn test_unknown_never_falls_back() {
        let mut manager = SchemaManager::new();
        assert!(manager.get_schema(ANALYTICS, RemoteVersion::Unknown).is_none());

        manager.register_schema(
            ANALYTICS,
            RemoteVersion::Unknown,
            EndpointSchema::new(ANALYTICS, RemoteVersion::Unknown),
        );
        let schema = manager.get_schema(ANALYTICS, RemoteVersion::Unknown).unwrap();
        assert_eq!(schema.version, RemoteVersion::Unknown);
        // Registering Unknown does not change known-version resolution
        assert_eq!(
            manager.get_schema(ANALYTICS, RemoteVersion::V2_39).unwrap().version,
            RemoteVersion::V2_38
        );
    }

    #[test]
    fn test_register_overwrites() {
        let mut manager = SchemaManager::empty();
        let first = EndpointSchema::new("custom", RemoteVersion::V2_40)
            .with_mapping(FieldMapping::new("a", "first"));
        let second = EndpointSchema::new("custom", RemoteVersion::V2_40)
            .with_mapping(FieldMapping::new("a", "second"));

        manager.register_schema("custom", RemoteVersion::V2_40, first);
        manager.register_schema("Custom", RemoteVersion::V2_40, second);

        assert_eq!(manager.len(), 1);
        let mapping = manager
            .get_field_mapping("custom", "a", RemoteVersion::V2_40)
            .unwrap();
        assert_eq!(mapping.target_field, "second");
    }

    #[test]
    fn test_field_mapping_respects_introduction() {
        let manager = SchemaManager::new();
        assert!(manager
            .get_field_mapping(ANALYTICS, "co", RemoteVersion::V2_38)
            .is_some());
        assert!(manager
            .get_field_mapping(ANALYTICS, "co", RemoteVersion::V2_37)
            .is_none());
        assert_eq!(
            manager
                .get_field_mapping(ANALYTICS, "dx", RemoteVersion::V2_40)
                .unwrap()
                .target_field,
            "data"
        );
    }

    #[test]
    fn test_pagination_fields() {
        let manager = SchemaManager::new();
        let fields = manager
            .get_pagination_fields(TRACKER, RemoteVersion::V2_40)
            .unwrap();
        assert_eq!(fields.get("page_size").map(String::as_str), Some("pageSize"));
        assert!(manager
            .get_pagination_fields(TRACKER, RemoteVersion::Unknown)
            .is_none());
    }

    #[test]
    fn test_list_versions_ordered() {
        let mut manager = SchemaManager::new();
        manager.register_schema(
            TRACKER,
            RemoteVersion::Unknown,
            EndpointSchema::new(TRACKER, RemoteVersion::Unknown),
        );
        assert_eq!(
            manager.list_versions(TRACKER),
            vec![
                RemoteVersion::Unknown,
                RemoteVersion::V2_36,
                RemoteVersion::V2_41
            ]
        );
        assert!(manager.list_versions("nope").is_empty());
    }
}
