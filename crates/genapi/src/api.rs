//! REST client for the remote generation service.
//!
//! Wraps the service's HTTP API (clip submission, operation polling,
//! artifact download, character description) using [`reqwest`], and
//! implements [`GenerationService`] on top of it.

use std::time::Duration;

use async_trait::async_trait;
use reelforge_core::service::{
    GenerationRequest, GenerationService, OperationHandle, PollResponse, ServiceError,
    SubmitResponse,
};
use reelforge_core::types::{Artifact, ArtifactRef, ReferenceImage};

use crate::messages::{DescribeBody, DescribeResponse, OperationBody, SubmitBody};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Content type assumed when a download carries none.
pub const DEFAULT_ARTIFACT_MIME: &str = "video/mp4";

/// HTTP client for one generation service endpoint.
pub struct GenApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Errors from the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum GenApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Generation API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose content made no sense.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Missing or malformed client settings.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<GenApiError> for ServiceError {
    fn from(err: GenApiError) -> Self {
        match err {
            GenApiError::Request(e) if e.is_decode() => ServiceError::Decode(e.to_string()),
            GenApiError::Request(e) => ServiceError::Transport(e.to_string()),
            GenApiError::ApiError { status, body } => ServiceError::Api { status, body },
            GenApiError::InvalidResponse(msg) => ServiceError::Decode(msg),
            GenApiError::Config(msg) => ServiceError::Transport(msg),
        }
    }
}

impl GenApiClient {
    /// Create a client for the service at `base_url`.
    ///
    /// * `api_key` - sent as [`API_KEY_HEADER`] when present.
    /// * `timeout` - per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GenApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit a clip for generation.
    ///
    /// Sends `POST /v1/generations` and returns the operation record.
    pub async fn submit_generation(
        &self,
        prompt: &str,
        reference_images: &[ReferenceImage],
    ) -> Result<OperationBody, GenApiError> {
        let body = SubmitBody {
            prompt,
            reference_images,
        };
        let response = self
            .authorized(self.client.post(self.url("/v1/generations")))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch the current state of an operation.
    ///
    /// Sends `GET /v1/operations/{name}`. The name is sent as one path
    /// segment, so slashes in it are percent-encoded.
    pub async fn get_operation(&self, name: &str) -> Result<OperationBody, GenApiError> {
        let response = self
            .authorized(self.client.get(self.operation_url(name)?))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Download the bytes behind an artifact URI.
    ///
    /// Absolute URIs are fetched as-is; relative ones are resolved against
    /// the base URL.
    pub async fn download_artifact(&self, uri: &str) -> Result<(String, Vec<u8>), GenApiError> {
        let url = if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_string()
        } else {
            self.url(&format!("/{}", uri.trim_start_matches('/')))
        };

        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::ensure_success(response).await?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ARTIFACT_MIME.to_string());

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(GenApiError::InvalidResponse(format!(
                "artifact {uri} is empty"
            )));
        }
        Ok((mime_type, bytes.to_vec()))
    }

    /// Ask the service to describe a character from a reference image.
    ///
    /// Sends `POST /v1/characters:describe`.
    pub async fn describe(
        &self,
        name: &str,
        image: &ReferenceImage,
    ) -> Result<String, GenApiError> {
        let response = self
            .authorized(self.client.post(self.url("/v1/characters:describe")))
            .json(&DescribeBody { name, image })
            .send()
            .await?;

        let parsed: DescribeResponse = Self::parse_response(response).await?;
        let description = parsed.description.trim().to_string();
        if description.is_empty() {
            return Err(GenApiError::InvalidResponse(format!(
                "empty description returned for {name}"
            )));
        }
        Ok(description)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn operation_url(&self, name: &str) -> Result<reqwest::Url, GenApiError> {
        let mut url = reqwest::Url::parse(&self.url("/v1/operations")).map_err(|e| {
            GenApiError::Config(format!("invalid base URL {}: {e}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                GenApiError::Config(format!("base URL {} cannot carry a path", self.base_url))
            })?
            .push(name);
        Ok(url)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GenApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GenApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GenApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Map a finished or running operation onto a [`PollResponse`].
pub fn operation_to_poll(op: OperationBody) -> PollResponse {
    if !op.done {
        return PollResponse::running();
    }
    if let Some(err) = op.error {
        let message = match err.code {
            Some(code) => format!("{} (code {code})", err.message),
            None => err.message,
        };
        return PollResponse::failed(message);
    }
    match op.response {
        Some(result) => PollResponse::succeeded(ArtifactRef::new(result.artifact_uri)),
        None => PollResponse::failed("operation finished without a result"),
    }
}

#[async_trait]
impl GenerationService for GenApiClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse, ServiceError> {
        let op = self
            .submit_generation(&request.directive_prompt, &request.reference_images)
            .await?;
        tracing::debug!(operation = %op.name, done = op.done, "Generation submitted");
        Ok(SubmitResponse {
            operation_handle: OperationHandle(op.name),
            done: op.done,
        })
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<PollResponse, ServiceError> {
        let op = self.get_operation(&handle.0).await?;
        Ok(operation_to_poll(op))
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, ServiceError> {
        let (mime_type, data) = self.download_artifact(artifact.as_str()).await?;
        tracing::debug!(artifact = %artifact, bytes = data.len(), "Artifact downloaded");
        Ok(Artifact::new(artifact.clone(), mime_type, data))
    }

    async fn describe_character(
        &self,
        name: &str,
        image: &ReferenceImage,
    ) -> Result<String, ServiceError> {
        Ok(self.describe(name, image).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{OperationError, OperationResult};

    fn op(done: bool) -> OperationBody {
        OperationBody {
            name: "operations/1".into(),
            done,
            response: None,
            error: None,
        }
    }

    #[test]
    fn running_operation_maps_to_not_done() {
        assert_eq!(operation_to_poll(op(false)), PollResponse::running());
    }

    #[test]
    fn finished_operation_maps_to_result() {
        let mut o = op(true);
        o.response = Some(OperationResult {
            artifact_uri: "files/clip.mp4".into(),
        });
        assert_eq!(
            operation_to_poll(o),
            PollResponse::succeeded(ArtifactRef::new("files/clip.mp4"))
        );
    }

    #[test]
    fn finished_operation_error_keeps_code() {
        let mut o = op(true);
        o.error = Some(OperationError {
            code: Some(429),
            message: "quota".into(),
        });
        assert_eq!(operation_to_poll(o), PollResponse::failed("quota (code 429)"));
    }

    #[test]
    fn finished_operation_without_result_is_a_failure() {
        let poll = operation_to_poll(op(true));
        assert!(poll.done);
        assert!(poll.error.is_some());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GenApiClient::with_client(reqwest::Client::new(), "http://host:9000/", None);
        assert_eq!(client.base_url(), "http://host:9000");
        assert_eq!(client.url("/v1/generations"), "http://host:9000/v1/generations");
    }

    #[test]
    fn operation_name_is_one_path_segment() {
        let client = GenApiClient::with_client(reqwest::Client::new(), "http://host:9000", None);
        let url = client.operation_url("operations/abc 1").unwrap();
        assert_eq!(
            url.as_str(),
            "http://host:9000/v1/operations/operations%2Fabc%201"
        );
    }

    #[test]
    fn api_error_maps_to_service_error() {
        let err: ServiceError = GenApiError::ApiError {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert!(matches!(err, ServiceError::Api { status: 503, .. }));
    }
}
