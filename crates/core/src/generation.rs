//! Per-scene generation status and its state machine.
//!
//! ```text
//! Pending -> Generating -> Polling -> Complete
//!                 |           |
//!                 +-> Error <-+
//! ```
//!
//! `Complete` and `Error` are terminal. `Polling -> Polling` is accepted as
//! a no-op so repeated "not done" polls do not produce new observable steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ArtifactRef, SceneId, Timestamp};

/// Fixed spacing between poll attempts.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Lifecycle state of one scene's generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    Pending,
    Generating,
    Polling,
    Complete,
    Error,
}

impl GenerationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationState::Complete | GenerationState::Error)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_advance_to(self, next: GenerationState) -> bool {
        use GenerationState::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Polling)
                | (Generating, Error)
                | (Polling, Polling)
                | (Polling, Complete)
                | (Polling, Error)
        )
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GenerationState::Pending => "pending",
            GenerationState::Generating => "generating",
            GenerationState::Polling => "polling",
            GenerationState::Complete => "complete",
            GenerationState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Status of one scene within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStatus {
    pub scene_id: SceneId,
    pub state: GenerationState,
    pub artifact_ref: Option<ArtifactRef>,
    pub error_message: Option<String>,
    pub updated_at: Timestamp,
}

impl GenerationStatus {
    /// A fresh `Pending` status for a scene.
    pub fn pending(scene_id: SceneId) -> Self {
        Self {
            scene_id,
            state: GenerationState::Pending,
            artifact_ref: None,
            error_message: None,
            updated_at: chrono::Utc::now(),
        }
    }

    /// Move to `next`, enforcing the state machine.
    ///
    /// Returns `Ok(true)` when the state changed and observers should be
    /// notified, `Ok(false)` for the re-entrant `Polling -> Polling` step.
    pub fn advance(&mut self, next: GenerationState) -> Result<bool, CoreError> {
        if !self.state.can_advance_to(next) {
            return Err(CoreError::IllegalTransition {
                scene_id: self.scene_id,
                from: self.state,
                to: next,
            });
        }
        if self.state == next {
            return Ok(false);
        }
        self.state = next;
        self.updated_at = chrono::Utc::now();
        Ok(true)
    }

    /// Transition `Polling -> Complete` and record the artifact.
    pub fn complete(&mut self, artifact_ref: ArtifactRef) -> Result<(), CoreError> {
        self.advance(GenerationState::Complete)?;
        self.artifact_ref = Some(artifact_ref);
        Ok(())
    }

    /// Transition to `Error` and record a human-readable message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.advance(GenerationState::Error)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

/// Number of statuses in each state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: usize,
    pub generating: usize,
    pub polling: usize,
    pub complete: usize,
    pub error: usize,
}

impl StateCounts {
    pub fn from_statuses(statuses: &[GenerationStatus]) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status.state {
                GenerationState::Pending => counts.pending += 1,
                GenerationState::Generating => counts.generating += 1,
                GenerationState::Polling => counts.polling += 1,
                GenerationState::Complete => counts.complete += 1,
                GenerationState::Error => counts.error += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use GenerationState::*;

    const ALL: [GenerationState; 5] = [Pending, Generating, Polling, Complete, Error];

    #[test]
    fn happy_path_transitions() {
        let mut s = GenerationStatus::pending(Uuid::new_v4());
        assert!(s.advance(Generating).unwrap());
        assert!(s.advance(Polling).unwrap());
        assert!(!s.advance(Polling).unwrap());
        s.complete(ArtifactRef::new("mem://clip")).unwrap();
        assert_eq!(s.state, Complete);
        assert_eq!(s.artifact_ref, Some(ArtifactRef::new("mem://clip")));
    }

    #[test]
    fn submission_failure_goes_straight_to_error() {
        let mut s = GenerationStatus::pending(Uuid::new_v4());
        s.advance(Generating).unwrap();
        s.fail("quota exceeded").unwrap();
        assert_eq!(s.state, Error);
        assert_eq!(s.error_message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn terminal_states_reject_every_mutation() {
        for terminal in [Complete, Error] {
            for next in ALL {
                assert!(!terminal.can_advance_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn polling_requires_generating_first() {
        let mut s = GenerationStatus::pending(Uuid::new_v4());
        let err = s.advance(Polling).unwrap_err();
        assert!(matches!(
            err,
            CoreError::IllegalTransition {
                from: Pending,
                to: Polling,
                ..
            }
        ));
        assert_eq!(s.state, Pending);
    }

    #[test]
    fn pending_cannot_complete_or_fail_directly() {
        assert!(!Pending.can_advance_to(Complete));
        assert!(!Pending.can_advance_to(Error));
        assert!(!Generating.can_advance_to(Complete));
    }

    #[test]
    fn counts_by_state() {
        let mut a = GenerationStatus::pending(Uuid::new_v4());
        a.advance(Generating).unwrap();
        let b = GenerationStatus::pending(Uuid::new_v4());
        let c = GenerationStatus::pending(Uuid::new_v4());
        let counts = StateCounts::from_statuses(&[a, b, c]);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.generating, 1);
        assert_eq!(counts.complete, 0);
    }

    #[test]
    fn state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Complete).unwrap(), "\"complete\"");
    }
}
