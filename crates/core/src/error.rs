use crate::generation::GenerationState;
use crate::types::SceneId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Scene {scene_id}: illegal status transition {from} -> {to}")]
    IllegalTransition {
        scene_id: SceneId,
        from: GenerationState,
        to: GenerationState,
    },

    #[error("Not found: {0}")]
    NotFound(String),
}
