//! Broadcast hub for pipeline events.
//!
//! One [`EventBus`] is shared (usually as `Arc<EventBus>`) between the
//! pipeline, which publishes, and any number of subscribers such as a log
//! writer or a UI bridge.

use chrono::{DateTime, Utc};
use reelforge_core::generation::{GenerationState, GenerationStatus, StateCounts};
use reelforge_core::types::{ArtifactRef, CharacterId, SceneId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const EVENT_RUN_STARTED: &str = "run.started";
pub const EVENT_CHARACTER_LOCKED: &str = "character.locked";
pub const EVENT_SCENE_STATUS: &str = "scene.status_changed";
pub const EVENT_RUN_FINISHED: &str = "run.finished";
pub const EVENT_COMPOSITION_PROGRESS: &str = "composition.progress";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Fresh statuses were created; the precheck is next.
    RunStarted { scene_count: usize },

    /// A character description was resolved during the precheck.
    CharacterLocked {
        character_id: CharacterId,
        name: String,
        image_digest: Option<String>,
    },

    SceneStatus {
        scene_id: SceneId,
        state: GenerationState,
        artifact_ref: Option<ArtifactRef>,
        error_message: Option<String>,
    },

    /// The sequencer stopped, successfully or not.
    RunFinished {
        counts: StateCounts,
        cancelled: bool,
        error: Option<String>,
        failed_scene: Option<SceneId>,
    },

    CompositionProgress { fraction: f64 },
}

/// A timestamped [`EventKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Snapshot of a scene status.
    pub fn scene_status(status: &GenerationStatus) -> Self {
        Self::new(EventKind::SceneStatus {
            scene_id: status.scene_id,
            state: status.state,
            artifact_ref: status.artifact_ref.clone(),
            error_message: status.error_message.clone(),
        })
    }

    /// Dotted event name, e.g. `"scene.status_changed"`.
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            EventKind::RunStarted { .. } => EVENT_RUN_STARTED,
            EventKind::CharacterLocked { .. } => EVENT_CHARACTER_LOCKED,
            EventKind::SceneStatus { .. } => EVENT_SCENE_STATUS,
            EventKind::RunFinished { .. } => EVENT_RUN_FINISHED,
            EventKind::CompositionProgress { .. } => EVENT_COMPOSITION_PROGRESS,
        }
    }

    /// Scene the event is about, if any.
    pub fn scene_id(&self) -> Option<SceneId> {
        match &self.kind {
            EventKind::SceneStatus { scene_id, .. } => Some(*scene_id),
            EventKind::RunFinished { failed_scene, .. } => *failed_scene,
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use reelforge_events::bus::{EventBus, EventKind, PipelineEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PipelineEvent::new(EventKind::RunStarted { scene_count: 3 }));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus holding up to `capacity` undelivered events.
    ///
    /// Subscribers that fall further behind see `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send to every current subscriber. Dropped when nobody listens.
    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
