//! Connection settings for the dhis2flow CLI
//!
//! Settings live in `<config_dir>/dhis2flow/config.toml`. Environment
//! variables (`DHIS2_URL`, `DHIS2_USERNAME`, `DHIS2_PASSWORD`,
//! `DHIS2_TIMEOUT_SECS`, `DHIS2_RPS`) take precedence over the file, and
//! command-line flags take precedence over both.

use crate::error::{CliError, Result};
use dhis2flow_common::redact::REDACTED;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

// ============================================================================
// Connection Configuration Constants
// ============================================================================

/// Default timeout for a single API request in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default request budget shared by all steps of a run.
pub const DEFAULT_RPS: f64 = 8.0;

/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "DHIS2FLOW_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_rps")]
    pub rps: f64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_rps() -> f64 {
    DEFAULT_RPS
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            rps: DEFAULT_RPS,
        }
    }
}

impl ConnectionConfig {
    /// Location of the config file
    pub fn path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }
        let dir = dirs::config_dir()
            .ok_or_else(|| CliError::config("Could not determine config directory"))?;
        Ok(dir.join("dhis2flow").join("config.toml"))
    }

    /// File settings merged with environment overrides
    pub fn load() -> Result<Self> {
        Self::load_file(&Self::path()?)?.with_env_overrides()
    }

    /// Read a config file; a missing file yields the defaults
    pub fn load_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;

        // The file may hold a password
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var("DHIS2_URL") {
            self.url = Some(url);
        }
        if let Ok(username) = std::env::var("DHIS2_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var("DHIS2_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(timeout) = std::env::var("DHIS2_TIMEOUT_SECS") {
            self.timeout_secs = timeout
                .parse()
                .map_err(|_| CliError::config(format!("DHIS2_TIMEOUT_SECS is not a number: {timeout}")))?;
        }
        if let Ok(rps) = std::env::var("DHIS2_RPS") {
            self.rps = rps
                .parse()
                .map_err(|_| CliError::config(format!("DHIS2_RPS is not a number: {rps}")))?;
        }
        Ok(self)
    }

    /// Apply a `--url` flag
    pub fn with_url(mut self, url: Option<&str>) -> Self {
        if let Some(url) = url {
            self.url = Some(url.to_string());
        }
        self
    }

    /// Parsed server URL; fails when none is configured
    pub fn base_url(&self) -> Result<Url> {
        let raw = self.url.as_deref().ok_or(CliError::NotConfigured)?;
        let url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| CliError::config(format!("Invalid DHIS2 URL '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CliError::config(format!(
                "DHIS2 URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Settings as `(key, value)` pairs with the password masked
    pub fn display_pairs(&self) -> Vec<(&'static str, String)> {
        let unset = || "(not set)".to_string();
        vec![
            ("url", self.url.clone().unwrap_or_else(unset)),
            ("username", self.username.clone().unwrap_or_else(unset)),
            (
                "password",
                self.password.as_ref().map_or_else(unset, |_| REDACTED.to_string()),
            ),
            ("timeout_secs", self.timeout_secs.to_string()),
            ("rps", self.rps.to_string()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        for key in ["DHIS2_URL", "DHIS2_USERNAME", "DHIS2_PASSWORD", "DHIS2_TIMEOUT_SECS", "DHIS2_RPS"] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConnectionConfig::load_file(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, ConnectionConfig::default());
        assert_eq!(config.rps, 8.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let config = ConnectionConfig {
            url: Some("https://play.dhis2.org/40".into()),
            username: Some("admin".into()),
            password: Some("district".into()),
            ..ConnectionConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ConnectionConfig::load_file(&path).unwrap(), config);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        std::env::set_var("DHIS2_URL", "https://env.example.org");
        std::env::set_var("DHIS2_TIMEOUT_SECS", "5");

        let config = ConnectionConfig {
            url: Some("https://file.example.org".into()),
            ..ConnectionConfig::default()
        }
        .with_env_overrides()
        .unwrap();
        assert_eq!(config.url.as_deref(), Some("https://env.example.org"));
        assert_eq!(config.timeout_secs, 5);

        std::env::set_var("DHIS2_RPS", "fast");
        assert!(ConnectionConfig::default().with_env_overrides().is_err());
        clear_env();
    }

    #[test]
    fn test_flag_overrides_everything() {
        let config = ConnectionConfig::default().with_url(Some("https://flag.example.org"));
        assert_eq!(config.base_url().unwrap().host_str(), Some("flag.example.org"));
    }

    #[test]
    fn test_base_url_validation() {
        assert!(matches!(
            ConnectionConfig::default().base_url(),
            Err(CliError::NotConfigured)
        ));
        let ftp = ConnectionConfig::default().with_url(Some("ftp://example.org"));
        assert!(ftp.base_url().is_err());
    }

    #[test]
    fn test_display_masks_password() {
        let config = ConnectionConfig {
            password: Some("district".into()),
            ..ConnectionConfig::default()
        };
        let pairs = config.display_pairs();
        let password = pairs.iter().find(|(k, _)| *k == "password").unwrap();
        assert_eq!(password.1, REDACTED);
        assert!(!format!("{pairs:?}").contains("district"));
    }
}
