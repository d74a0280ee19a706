//! Run-level and per-scene failures.

use reelforge_core::compositor::CompositionFailure;
use reelforge_core::error::CoreError;
use reelforge_core::service::ServiceError;
use reelforge_core::types::SceneId;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A character description could not be resolved; no scene was started.
    #[error("Precheck failed for character '{character}': {source}")]
    Precheck {
        character: String,
        #[source]
        source: ServiceError,
    },

    #[error("Scene {scene_id}: submission failed: {source}")]
    Submission {
        scene_id: SceneId,
        #[source]
        source: ServiceError,
    },

    /// Polling gave up (repeated transport failures or timeout). The job
    /// itself may still be running remotely.
    #[error("Scene {scene_id}: polling failed: {reason}")]
    Poll { scene_id: SceneId, reason: String },

    /// The remote job finished and reported an error.
    #[error("Scene {scene_id}: generation failed: {message}")]
    JobFailed { scene_id: SceneId, message: String },

    #[error("Scene {scene_id}: artifact download failed: {source}")]
    ArtifactFetch {
        scene_id: SceneId,
        #[source]
        source: ServiceError,
    },

    #[error(transparent)]
    Composition(#[from] CompositionFailure),

    /// Composition was requested for a run that did not finish.
    #[error("Run cannot be composed: {0}")]
    NotComposable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// Scene the failure belongs to, for per-scene errors.
    pub fn scene_id(&self) -> Option<SceneId> {
        match self {
            PipelineError::Submission { scene_id, .. }
            | PipelineError::Poll { scene_id, .. }
            | PipelineError::JobFailed { scene_id, .. }
            | PipelineError::ArtifactFetch { scene_id, .. } => Some(*scene_id),
            _ => None,
        }
    }
}
