//! Seam to the media compositing engine.

use async_trait::async_trait;

use crate::composition::CompositionSpec;
use crate::types::Artifact;

/// Receives normalized composition progress in `0.0..=1.0`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Failure while composing; carries the engine's diagnostic text.
#[derive(Debug, thiserror::Error)]
#[error("composition failed: {diagnostic}")]
pub struct CompositionFailure {
    pub diagnostic: String,
}

impl CompositionFailure {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }
}

/// Joins ordered clips into one playable resource.
///
/// Implementations return the sole input unchanged when the spec holds a
/// single clip, and never return partial output on failure.
#[async_trait]
pub trait MediaCompositor: Send + Sync {
    async fn compose(
        &self,
        spec: &CompositionSpec,
        progress: ProgressFn<'_>,
    ) -> Result<Artifact, CompositionFailure>;
}
