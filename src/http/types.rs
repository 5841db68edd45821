//! Typed request and response payloads for the deploy API.
//!
//! Only the fields this client actually consumes are modeled; the API
//! returns many more.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body for `POST /sites`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSiteRequest {
    pub name: String,
}

/// A site resource as returned by the deploy API.
#[derive(Debug, Clone, Deserialize)]
pub struct Site {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// HTTPS URL of the published site
    #[serde(default)]
    pub ssl_url: Option<String>,

    /// Plain URL, fallback when no HTTPS URL is present
    #[serde(default)]
    pub url: Option<String>,
}

impl Site {
    /// Public URL of the site, preferring HTTPS.
    pub fn public_url(&self) -> Option<&str> {
        self.ssl_url.as_deref().or(self.url.as_deref())
    }
}

/// Body for `POST /sites/{id}/deploys`: the complete manifest.
#[derive(Debug, Clone, Serialize)]
pub struct CreateDeployRequest {
    pub files: BTreeMap<String, String>,
}

/// Response to deploy creation: the deploy id plus the subset of manifest
/// paths the remote side does not already hold and needs uploaded.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDeployResponse {
    pub id: String,

    #[serde(default)]
    pub required: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_public_url_prefers_https() {
        let site = Site {
            id: "s1".to_string(),
            name: None,
            ssl_url: Some("https://example.netlify.app".to_string()),
            url: Some("http://example.netlify.app".to_string()),
        };
        assert_eq!(site.public_url(), Some("https://example.netlify.app"));
    }

    #[test]
    fn test_site_public_url_falls_back() {
        let site = Site {
            id: "s1".to_string(),
            name: None,
            ssl_url: None,
            url: Some("http://example.netlify.app".to_string()),
        };
        assert_eq!(site.public_url(), Some("http://example.netlify.app"));
    }

    #[test]
    fn test_deploy_response_required_defaults_empty() {
        let response: CreateDeployResponse =
            serde_json::from_str(r#"{"id": "dep-1"}"#).unwrap();
        assert_eq!(response.id, "dep-1");
        assert!(response.required.is_empty());
    }
}
