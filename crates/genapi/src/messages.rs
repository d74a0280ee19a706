//! JSON bodies exchanged with the generation service.

use reelforge_core::types::ReferenceImage;
use serde::{Deserialize, Serialize};

/// `POST /v1/generations` request body.
#[derive(Debug, Serialize)]
pub struct SubmitBody<'a> {
    pub prompt: &'a str,
    /// Image bytes are base64-encoded by [`ReferenceImage`]'s serializer.
    pub reference_images: &'a [ReferenceImage],
}

/// A long-running operation as reported by the service.
///
/// Returned both by submission and by `GET /v1/operations/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationBody {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: Option<OperationResult>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

/// Successful result of a finished operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationResult {
    pub artifact_uri: String,
}

/// Failure reported by a finished operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i32>,
    pub message: String,
}

/// `POST /v1/characters:describe` request body.
#[derive(Debug, Serialize)]
pub struct DescribeBody<'a> {
    pub name: &'a str,
    pub image: &'a ReferenceImage,
}

/// `POST /v1/characters:describe` response body.
#[derive(Debug, Deserialize)]
pub struct DescribeResponse {
    pub description: String,
}
