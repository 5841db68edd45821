//! Custom error types for the deploy client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    /// Missing or invalid caller configuration. Raised before any network
    /// call is attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local directory missing, or the remote returned 404 for a site fetch.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote rejected the credential (401/403 on a site call).
    #[error("Authentication error: {status} - {body}")]
    Auth { status: u16, body: String },

    /// Transport-level failure: DNS, connection reset, timeout.
    #[error("Network error: {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    /// Any other non-2xx response from the remote.
    #[error("Remote error at {url}: {status} - {body}")]
    Remote {
        url: String,
        status: u16,
        body: String,
    },

    /// The remote response broke the deploy protocol contract, e.g. a
    /// required path that is not in the submitted manifest.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// One or more required uploads failed. The deploy stays non-finalized.
    #[error("Upload failed for {} required file(s): {}", .failed.len(), .failed.join(", "))]
    PartialUpload { failed: Vec<String> },

    /// The caller aborted the deploy attempt.
    #[error("Deploy cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
