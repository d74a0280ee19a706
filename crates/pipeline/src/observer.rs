//! Run observers.
//!
//! The sequencer calls a [`StatusObserver`] synchronously after every
//! observable step. [`EventBus`] implements it by publishing
//! [`PipelineEvent`]s, so any number of subscribers can follow a run.

use reelforge_core::generation::GenerationStatus;
use reelforge_core::types::Character;
use reelforge_events::{EventBus, EventKind, PipelineEvent};

use crate::sequencer::RunOutcome;

/// Receives run progress. Only `status_changed` is required.
pub trait StatusObserver: Send + Sync {
    /// A scene's status moved to a new state.
    fn status_changed(&self, status: &GenerationStatus);

    /// Fresh `Pending` statuses were created for a new run.
    fn run_started(&self, _statuses: &[GenerationStatus]) {}

    /// A character's description was resolved during the precheck.
    fn character_locked(&self, _character: &Character) {}

    fn run_finished(&self, _outcome: &RunOutcome) {}

    /// Composition progress in `0.0..=1.0`.
    fn composition_progress(&self, _fraction: f64) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StatusObserver for NoopObserver {
    fn status_changed(&self, _status: &GenerationStatus) {}
}

/// Adapts a closure into a status-only observer.
pub struct FnObserver<F>(pub F);

impl<F> StatusObserver for FnObserver<F>
where
    F: Fn(&GenerationStatus) + Send + Sync,
{
    fn status_changed(&self, status: &GenerationStatus) {
        (self.0)(status)
    }
}

impl StatusObserver for EventBus {
    fn status_changed(&self, status: &GenerationStatus) {
        self.publish(PipelineEvent::scene_status(status));
    }

    fn run_started(&self, statuses: &[GenerationStatus]) {
        self.publish(PipelineEvent::new(EventKind::RunStarted {
            scene_count: statuses.len(),
        }));
    }

    fn character_locked(&self, character: &Character) {
        self.publish(PipelineEvent::new(EventKind::CharacterLocked {
            character_id: character.id,
            name: character.name.clone(),
            image_digest: character.locked_image_digest.clone(),
        }));
    }

    fn run_finished(&self, outcome: &RunOutcome) {
        self.publish(PipelineEvent::new(EventKind::RunFinished {
            counts: outcome.counts(),
            cancelled: outcome.cancelled,
            error: outcome.failure.as_ref().map(|e| e.to_string()),
            failed_scene: outcome.failure.as_ref().and_then(|e| e.scene_id()),
        }));
    }

    fn composition_progress(&self, fraction: f64) {
        self.publish(PipelineEvent::new(EventKind::CompositionProgress { fraction }));
    }
}
