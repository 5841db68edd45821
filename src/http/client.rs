//! HTTP client for the deploy API.
//!
//! One `reqwest::Client`, and therefore one connection pool, is shared
//! across every call, including parallel file uploads. Each method maps
//! failures into the crate error taxonomy at the boundary: transport
//! failures become `Network` with the failing URL, non-2xx responses become
//! `NotFound`/`Auth`/`Remote` depending on the call, and undecodable 2xx
//! bodies become `Protocol`.

use reqwest::{header, Client, Response, Url};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::http::types::{CreateDeployRequest, CreateDeployResponse, CreateSiteRequest, Site};
use crate::utils::errors::{DeployError, Result};

/// Typed client for the remote deploy API. Cheap to clone; clones share the
/// underlying connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    /// Build a client from the configuration. No network traffic happens
    /// here.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .map_err(|e| DeployError::Config(format!("failed to build HTTP client: {}", e)))?;

        let base_url = config.api.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| DeployError::Config(format!("invalid API base URL {}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            token: config.auth.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /sites` - create a new site resource.
    pub async fn create_site(&self, name: &str) -> Result<Site> {
        let url = format!("{}/sites", self.base_url);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .json(&CreateSiteRequest {
                name: name.to_string(),
            })
            .send()
            .await
            .map_err(|e| Self::network(&url, e))?;

        let response = Self::check_site_response(&url, response, None).await?;
        Self::decode(&url, response).await
    }

    /// `GET /sites/{id}` - fetch an existing site resource.
    pub async fn get_site(&self, site_id: &str) -> Result<Site> {
        let url = format!("{}/sites/{}", self.base_url, site_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(|e| Self::network(&url, e))?;

        let response = Self::check_site_response(&url, response, Some(site_id)).await?;
        Self::decode(&url, response).await
    }

    /// `POST /sites/{id}/deploys` - submit the manifest, receive the deploy
    /// id and the required path set.
    ///
    /// Not idempotent remotely: every call creates a distinct deploy
    /// attempt, so callers issue it exactly once per publish.
    pub async fn create_deploy(
        &self,
        site_id: &str,
        files: BTreeMap<String, String>,
    ) -> Result<CreateDeployResponse> {
        let url = format!("{}/sites/{}/deploys", self.base_url, site_id);
        debug!("POST {} ({} files)", url, files.len());

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.bearer())
            .json(&CreateDeployRequest { files })
            .send()
            .await
            .map_err(|e| Self::network(&url, e))?;

        if !response.status().is_success() {
            return Err(Self::remote(&url, response).await);
        }
        Self::decode(&url, response).await
    }

    /// `PUT /deploys/{id}/files{path}` - upload one file's raw bytes.
    ///
    /// `path` is a manifest path and therefore already starts with `/`.
    pub async fn upload_file(
        &self,
        deploy_id: &str,
        path: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let url = self.upload_url(deploy_id, path)?;
        debug!("PUT {} ({} bytes, {})", url, bytes.len(), content_type);

        let response = self
            .client
            .put(url.clone())
            .header(header::AUTHORIZATION, self.bearer())
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| Self::network(url.as_str(), e))?;

        if !response.status().is_success() {
            return Err(Self::remote(url.as_str(), response).await);
        }
        Ok(())
    }

    /// Build the upload URL for one manifest path.
    ///
    /// File names may contain `#`, `?`, or spaces; `set_path`
    /// percent-encodes them so they stay part of the path.
    fn upload_url(&self, deploy_id: &str, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            DeployError::Config(format!("invalid API base URL {}: {}", self.base_url, e))
        })?;
        url.set_path(&format!(
            "{}/deploys/{}/files{}",
            url.path().trim_end_matches('/'),
            deploy_id,
            path
        ));
        Ok(url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn network(url: &str, source: reqwest::Error) -> DeployError {
        DeployError::Network {
            url: url.to_string(),
            source,
        }
    }

    /// Map a non-2xx site response: 404 on a fetch -> `NotFound`, 401/403 ->
    /// `Auth`, anything else -> `Remote`.
    async fn check_site_response(
        url: &str,
        response: Response,
        fetched_id: Option<&str>,
    ) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        match (status, fetched_id) {
            (404, Some(id)) => Err(DeployError::NotFound(format!(
                "site {}: {} - {}",
                id, status, body
            ))),
            (401 | 403, _) => Err(DeployError::Auth { status, body }),
            _ => Err(DeployError::Remote {
                url: url.to_string(),
                status,
                body,
            }),
        }
    }

    /// Build a `Remote` error from a non-2xx response, consuming the body.
    async fn remote(url: &str, response: Response) -> DeployError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        DeployError::Remote {
            url: url.to_string(),
            status,
            body,
        }
    }

    /// Decode a 2xx JSON body; an undecodable body is a protocol violation.
    async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| DeployError::Protocol(format!("invalid response body from {}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_base(base_url: &str) -> Config {
        let mut config = Config::default();
        config.auth.token = "tok".to_string();
        config.api.base_url = base_url.to_string();
        config
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new(&config_with_base("https://api.example.com/api/v1/")).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/api/v1");
    }

    #[test]
    fn test_base_url_kept_without_slash() {
        let client = ApiClient::new(&config_with_base("https://api.example.com/api/v1")).unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/api/v1");
    }

    #[test]
    fn test_unparseable_base_url_is_config_error() {
        let result = ApiClient::new(&config_with_base("not a url"));
        assert!(matches!(result, Err(DeployError::Config(_))));
    }

    #[test]
    fn test_upload_url_joins_base_and_manifest_path() {
        let client = ApiClient::new(&config_with_base("https://api.example.com/api/v1")).unwrap();
        let url = client.upload_url("dep-1", "/css/site.css").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v1/deploys/dep-1/files/css/site.css"
        );
    }

    #[test]
    fn test_upload_url_percent_encodes_unsafe_names() {
        let client = ApiClient::new(&config_with_base("https://api.example.com/api/v1")).unwrap();
        let url = client.upload_url("dep-1", "/docs/faq#1?.html").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/api/v1/deploys/dep-1/files/docs/faq%231%3F.html"
        );
    }
}
