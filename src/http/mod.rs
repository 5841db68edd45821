//! Typed HTTP layer for the remote deploy API.

pub mod client;
pub mod types;

pub use client::ApiClient;
pub use types::{CreateDeployResponse, Site};
