//! HTTP client for the remote clip generation service.

pub mod api;
pub mod config;
pub mod messages;

pub use api::{GenApiClient, GenApiError};
pub use config::GenApiConfig;
