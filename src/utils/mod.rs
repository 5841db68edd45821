//! Utility modules for the deploy client.

pub mod errors;
pub mod logger;

pub use errors::{DeployError, Result};
