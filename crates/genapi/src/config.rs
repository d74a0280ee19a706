use std::time::Duration;

use crate::api::{GenApiClient, GenApiError};

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the generation service.
#[derive(Debug, Clone)]
pub struct GenApiConfig {
    /// Service root, e.g. `https://gen.example.com`.
    pub base_url: String,
    /// Sent in the `x-api-key` header when set.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GenApiConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var               | Default      |
    /// |-----------------------|--------------|
    /// | `GENAPI_BASE_URL`     | *(required)* |
    /// | `GENAPI_KEY`          | *(none)*     |
    /// | `GENAPI_TIMEOUT_SECS` | `60`         |
    pub fn from_env() -> Result<Self, GenApiError> {
        let base_url = std::env::var("GENAPI_BASE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| GenApiError::Config("GENAPI_BASE_URL must be set".into()))?;

        let api_key = std::env::var("GENAPI_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let timeout_secs: u64 = match std::env::var("GENAPI_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                GenApiError::Config(format!("GENAPI_TIMEOUT_SECS must be a valid u64, got {raw:?}"))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            base_url,
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Build a client from these settings.
    pub fn into_client(self) -> Result<GenApiClient, GenApiError> {
        GenApiClient::new(self.base_url, self.api_key, self.timeout)
    }
}
