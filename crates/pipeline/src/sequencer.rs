//! Strictly ordered, fail-fast run over a session's scenes.

use reelforge_core::composition::{CompletedClip, CompositionSpec};
use reelforge_core::generation::{GenerationStatus, StateCounts};
use reelforge_core::prompt::compose_directive;
use reelforge_core::service::{GenerationRequest, GenerationService};
use reelforge_core::types::Scene;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::driver::SceneDriver;
use crate::error::PipelineError;
use crate::observer::StatusObserver;
use crate::precheck::resolve_descriptions;
use crate::session::Session;

// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// Everything a run produced, successful or not.
#[derive(Debug)]
pub struct RunOutcome {
    /// One status per scene, in the run's scene order.
    pub statuses: Vec<GenerationStatus>,
    /// Clips of `Complete` scenes, in scene order.
    pub clips: Vec<CompletedClip>,
    /// The error that stopped the run, if any.
    pub failure: Option<PipelineError>,
    /// The run was cancelled between scenes.
    pub cancelled: bool,
    /// Character descriptions resolved by the precheck.
    pub descriptions_resolved: usize,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && !self.cancelled
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts::from_statuses(&self.statuses)
    }

    /// Composition input for the given scene order.
    ///
    /// Pass the session's current scenes to honour a reorder made after
    /// the run.
    pub fn composition_spec(&self, scenes: &[Scene]) -> CompositionSpec {
        CompositionSpec::from_clips(scenes, &self.clips)
    }

    /// One-line human readable report.
    pub fn summary(&self) -> String {
        let c = self.counts();
        let head = match (&self.failure, self.cancelled) {
            (Some(err), _) => format!("failed: {err}"),
            (None, true) => "cancelled".to_string(),
            (None, false) => "succeeded".to_string(),
        };
        format!(
            "Run {head} ({} scenes: {} complete, {} error, {} pending)",
            self.statuses.len(),
            c.complete,
            c.error,
            c.pending
        )
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Runs scenes one at a time, in order, stopping at the first error.
pub struct Sequencer<'a> {
    service: &'a dyn GenerationService,
    config: &'a PipelineConfig,
    observer: &'a dyn StatusObserver,
    cancel: CancellationToken,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        service: &'a dyn GenerationService,
        config: &'a PipelineConfig,
        observer: &'a dyn StatusObserver,
    ) -> Self {
        Self {
            service,
            config,
            observer,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the run between scenes when `cancel` fires. A token that is
    /// already cancelled stops the run before the precheck.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every scene of `session`.
    ///
    /// Resolved character descriptions are written back to the session.
    /// Nothing else in it is modified.
    pub async fn run(&self, session: &mut Session) -> RunOutcome {
        let mut outcome = RunOutcome {
            statuses: session
                .scenes
                .iter()
                .map(|s| GenerationStatus::pending(s.id))
                .collect(),
            clips: Vec::new(),
            failure: None,
            cancelled: false,
            descriptions_resolved: 0,
        };
        tracing::info!(scenes = outcome.statuses.len(), "Run started");
        self.observer.run_started(&outcome.statuses);

        if self.cancel.is_cancelled() {
            tracing::info!("Run cancelled before the precheck");
            outcome.cancelled = true;
            self.finish(&outcome);
            return outcome;
        }

        match resolve_descriptions(
            self.service,
            &mut session.characters,
            self.config.describe_concurrency,
            self.observer,
        )
        .await
        {
            Ok(resolved) => outcome.descriptions_resolved = resolved,
            Err(err) => {
                tracing::error!(error = %err, "Precheck failed, no scene started");
                outcome.failure = Some(err);
                self.finish(&outcome);
                return outcome;
            }
        }

        let snapshot = session.snapshot();
        let reference_images = snapshot.reference_images();
        let driver = SceneDriver::new(self.service, &self.config.poll, self.observer);

        for (index, scene) in snapshot.scenes.iter().enumerate() {
            if self.cancel.is_cancelled() {
                tracing::info!(
                    remaining = snapshot.scenes.len() - index,
                    "Run cancelled before next scene",
                );
                outcome.cancelled = true;
                break;
            }

            let prev = index.checked_sub(1).map(|i| &snapshot.scenes[i]);
            let request = GenerationRequest {
                directive_prompt: compose_directive(scene, &snapshot.model, prev),
                reference_images: reference_images.clone(),
            };

            match driver.run(&mut outcome.statuses[index], request).await {
                Ok(artifact) => outcome.clips.push(CompletedClip {
                    scene_id: scene.id,
                    artifact,
                }),
                Err(err) => {
                    tracing::error!(
                        scene_id = %scene.id,
                        position = index + 1,
                        error = %err,
                        "Scene failed, stopping run",
                    );
                    outcome.failure = Some(err);
                    break;
                }
            }
        }

        self.finish(&outcome);
        outcome
    }

    fn finish(&self, outcome: &RunOutcome) {
        tracing::info!(summary = %outcome.summary(), "Run finished");
        self.observer.run_finished(outcome);
    }
}
