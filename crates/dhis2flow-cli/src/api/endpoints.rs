//! API endpoint URL builders
//!
//! Maps the engine's logical endpoint names onto DHIS2 resource paths.

use url::Url;

/// Remote resources the client knows how to read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Analytics,
    DataValueSets,
    TrackerEvents,
    Metadata,
}

impl Resource {
    /// Resolve a logical endpoint name (`analytics`, `dataValueSets`, ...)
    pub fn from_endpoint(endpoint: &str) -> Option<Self> {
        match endpoint.trim_matches('/').to_ascii_lowercase().as_str() {
            "analytics" => Some(Resource::Analytics),
            "datavaluesets" => Some(Resource::DataValueSets),
            "tracker/events" | "events" => Some(Resource::TrackerEvents),
            "metadata" => Some(Resource::Metadata),
            _ => None,
        }
    }

    /// Path below `/api/`
    pub fn path(self) -> &'static str {
        match self {
            Resource::Analytics => "analytics.json",
            Resource::DataValueSets => "dataValueSets.json",
            Resource::TrackerEvents => "tracker/events.json",
            Resource::Metadata => "metadata.json",
        }
    }
}

/// Build an API URL below the server base, which may carry a context path
pub fn api_url(base_url: &Url, path: &str) -> String {
    format!(
        "{}/api/{}",
        base_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Build resource URL
pub fn resource_url(base_url: &Url, resource: Resource) -> String {
    api_url(base_url, resource.path())
}

/// Build system info URL (server version)
pub fn system_info_url(base_url: &Url) -> String {
    api_url(base_url, "system/info.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_keep_context_path() {
        let base = Url::parse("https://play.dhis2.org/40/").unwrap();
        assert_eq!(
            resource_url(&base, Resource::Analytics),
            "https://play.dhis2.org/40/api/analytics.json"
        );
        assert_eq!(
            system_info_url(&base),
            "https://play.dhis2.org/40/api/system/info.json"
        );
    }

    #[test]
    fn test_resource_lookup() {
        assert_eq!(Resource::from_endpoint("dataValueSets"), Some(Resource::DataValueSets));
        assert_eq!(Resource::from_endpoint("tracker/events"), Some(Resource::TrackerEvents));
        assert_eq!(Resource::from_endpoint("reports"), None);
    }
}
