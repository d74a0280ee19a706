//! Seam to the remote generative service.
//!
//! The service is opaque: it accepts a directive plus reference images,
//! hands back a long-running operation handle, and eventually reports a
//! produced artifact or an error. [`GenerationService`] abstracts the
//! transport so the pipeline can be driven by the HTTP client in
//! `reelforge-genapi` or by an in-memory fake in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Artifact, ArtifactRef, ReferenceImage};

/// A request to generate one clip.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub directive_prompt: String,
    pub reference_images: Vec<ReferenceImage>,
}

/// Opaque handle of a long-running remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl std::fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub operation_handle: OperationHandle,
    pub done: bool,
}

/// Answer to a poll.
///
/// `done == false` means the job is still running. A finished job carries
/// either `result` or `error`; a finished job with neither is treated as a
/// failure by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollResponse {
    pub done: bool,
    pub result: Option<ArtifactRef>,
    pub error: Option<String>,
}

impl PollResponse {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn succeeded(result: ArtifactRef) -> Self {
        Self {
            done: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            done: true,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Transport-level failure talking to the service.
///
/// A job that ran and *reported* failure is not a `ServiceError`; it comes
/// back as a [`PollResponse`] with `error` set.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServiceError {
    /// The request never produced a response (network, DNS, TLS, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("service error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body could not be understood.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Operations the pipeline needs from the generative service.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Start generating one clip.
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse, ServiceError>;

    /// Check on a previously submitted job.
    async fn poll(&self, handle: &OperationHandle) -> Result<PollResponse, ServiceError>;

    /// Download the media behind an artifact reference.
    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, ServiceError>;

    /// Derive a plain-text appearance description from a reference image.
    async fn describe_character(
        &self,
        name: &str,
        image: &ReferenceImage,
    ) -> Result<String, ServiceError>;
}
