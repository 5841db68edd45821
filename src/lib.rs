//! Pagelift Library
//!
//! Incremental static-site deploy client. A deploy hashes a local directory
//! into a manifest, negotiates with the deploy API for the set of files the
//! remote side is missing, and uploads only those.

pub mod config;
pub mod deploy;
pub mod http;
pub mod manifest;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use deploy::state::DeployPhase;
pub use deploy::{Deployer, DeploySummary};
pub use http::ApiClient;
pub use manifest::Manifest;
pub use utils::errors::{DeployError, Result};
