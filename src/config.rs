//! Configuration for the deploy client.
//!
//! Loaded from a TOML file; the CLI layers flag and environment overrides on
//! top. The library itself never reads the environment: the credential and
//! every other setting enter through this struct at construction time.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::errors::{DeployError, Result};

/// Default deploy API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.netlify.com/api/v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub site: SiteConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Deploy API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token for the deploy API
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Existing site to deploy to; a new site is created when unset
    #[serde(default)]
    pub id: Option<String>,

    /// Name prefix for newly created sites
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum concurrent file uploads
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_name_prefix() -> String {
    "pagelift".to_string()
}

fn default_concurrency() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            token: String::new(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            id: None,
            name_prefix: default_name_prefix(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            concurrency: default_concurrency(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            DeployError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Ok(config)
    }

    /// Check that everything a deploy needs is present.
    ///
    /// Runs before any network call so a bad configuration never reaches the
    /// remote API.
    pub fn validate(&self) -> Result<()> {
        if self.auth.token.trim().is_empty() {
            return Err(DeployError::Config("API token is missing".to_string()));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(DeployError::Config("API base URL is missing".to_string()));
        }
        if let Some(id) = &self.site.id {
            if id.trim().is_empty() {
                return Err(DeployError::Config(
                    "site id is set but empty".to_string(),
                ));
            }
        }
        if self.upload.concurrency == 0 {
            return Err(DeployError::Config(
                "upload concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
        assert_eq!(config.api.timeout_secs, 60);
        assert!(config.auth.token.is_empty());
        assert!(config.site.id.is_none());
        assert_eq!(config.site.name_prefix, "pagelift");
        assert_eq!(config.upload.concurrency, 8);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[auth]
token = "tok-123"

[site]
id = "site-abc"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.auth.token, "tok-123");
        assert_eq!(config.site.id.as_deref(), Some("site-abc"));
        // Unspecified sections and fields fall back to defaults
        assert_eq!(config.api.base_url, DEFAULT_API_BASE);
        assert_eq!(config.upload.concurrency, 8);
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid toml [").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(DeployError::Config(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file(Path::new("/nonexistent/pagelift.toml"));
        assert!(matches!(result, Err(DeployError::Io(_))));
    }

    #[test]
    fn test_validate_requires_token() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DeployError::Config(_)));
        assert!(err.to_string().contains("token is missing"));
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let mut config = Config::default();
        config.auth.token = "tok".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_whitespace_token() {
        let mut config = Config::default();
        config.auth.token = "   ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_site_id() {
        let mut config = Config::default();
        config.auth.token = "tok".to_string();
        config.site.id = Some(String::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.auth.token = "tok".to_string();
        config.upload.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
