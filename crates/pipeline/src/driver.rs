//! Per-scene generation job: submit, poll until done, fetch the clip.
//!
//! The driver is the only writer of a scene's [`GenerationStatus`]. Every
//! state change goes through [`GenerationStatus::advance`] and is reported
//! to the observer right after it happens; the re-entrant
//! `Polling -> Polling` step is not reported.

use std::time::Duration;

use reelforge_core::generation::{GenerationState, GenerationStatus};
use reelforge_core::service::{GenerationRequest, GenerationService, OperationHandle};
use reelforge_core::types::{Artifact, ArtifactRef};
use tokio::time::Instant;

use crate::error::PipelineError;
use crate::observer::StatusObserver;
use crate::poll::{FailureTracker, PollPolicy};

pub struct SceneDriver<'a> {
    service: &'a dyn GenerationService,
    policy: &'a PollPolicy,
    observer: &'a dyn StatusObserver,
}

impl<'a> SceneDriver<'a> {
    pub fn new(
        service: &'a dyn GenerationService,
        policy: &'a PollPolicy,
        observer: &'a dyn StatusObserver,
    ) -> Self {
        Self {
            service,
            policy,
            observer,
        }
    }

    /// Drive one `Pending` scene to a terminal state.
    ///
    /// On success the status is `Complete` and the downloaded clip is
    /// returned. On failure the status is `Error` with the failure message.
    pub async fn run(
        &self,
        status: &mut GenerationStatus,
        request: GenerationRequest,
    ) -> Result<Artifact, PipelineError> {
        match self.drive(status, request).await {
            Ok(artifact) => Ok(artifact),
            Err(err) => {
                if !status.state.is_terminal() {
                    match status.fail(err.to_string()) {
                        Ok(()) => self.observer.status_changed(status),
                        Err(e) => tracing::warn!(
                            scene_id = %status.scene_id,
                            state = %status.state,
                            error = %e,
                            "Could not record scene failure",
                        ),
                    }
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        status: &mut GenerationStatus,
        request: GenerationRequest,
    ) -> Result<Artifact, PipelineError> {
        let scene_id = status.scene_id;

        self.transition(status, GenerationState::Generating)?;
        tracing::info!(
            scene_id = %scene_id,
            images = request.reference_images.len(),
            "Submitting scene",
        );

        let submitted = self
            .service
            .submit(&request)
            .await
            .map_err(|source| PipelineError::Submission { scene_id, source })?;

        self.transition(status, GenerationState::Polling)?;
        tracing::info!(
            scene_id = %scene_id,
            operation = %submitted.operation_handle,
            done = submitted.done,
            "Scene submitted",
        );

        let artifact_ref = self
            .poll_until_done(status, &submitted.operation_handle, submitted.done)
            .await?;

        let artifact = self
            .service
            .fetch_artifact(&artifact_ref)
            .await
            .map_err(|source| PipelineError::ArtifactFetch { scene_id, source })?;

        status.complete(artifact_ref)?;
        self.observer.status_changed(status);
        tracing::info!(
            scene_id = %scene_id,
            artifact = %artifact.reference,
            bytes = artifact.data.len(),
            "Scene complete",
        );
        Ok(artifact)
    }

    /// Poll until the operation reports done.
    ///
    /// When the submission already reported done, the first poll happens
    /// immediately; otherwise it waits one interval. With a timeout, waits
    /// are cut short at the deadline and one last poll happens there.
    async fn poll_until_done(
        &self,
        status: &mut GenerationStatus,
        handle: &OperationHandle,
        submitted_done: bool,
    ) -> Result<ArtifactRef, PipelineError> {
        let scene_id = status.scene_id;
        let started = Instant::now();
        let mut failures = FailureTracker::new(self.policy);
        let mut wait = if submitted_done {
            Duration::ZERO
        } else {
            self.policy.interval
        };
        let mut attempt = 0u32;

        loop {
            if let Some(timeout) = self.policy.timeout {
                let elapsed = started.elapsed();
                if attempt > 0 && elapsed >= timeout {
                    return Err(PipelineError::Poll {
                        scene_id,
                        reason: format!(
                            "no result after {}s ({attempt} polls)",
                            elapsed.as_secs()
                        ),
                    });
                }
                // The last poll lands on the deadline.
                wait = wait.min(timeout.saturating_sub(elapsed));
            }
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            attempt += 1;

            let response = match self.service.poll(handle).await {
                Ok(response) => {
                    failures.reset();
                    response
                }
                Err(e) => match failures.record_failure() {
                    Some(delay) => {
                        tracing::warn!(
                            scene_id = %scene_id,
                            attempt,
                            failures = failures.consecutive(),
                            error = %e,
                            "Poll failed, backing off",
                        );
                        wait = delay;
                        continue;
                    }
                    None => {
                        return Err(PipelineError::Poll {
                            scene_id,
                            reason: format!(
                                "{} consecutive failures, last: {e}",
                                failures.consecutive()
                            ),
                        });
                    }
                },
            };

            if !response.done {
                // Re-entrant step; never reported.
                status.advance(GenerationState::Polling)?;
                tracing::debug!(scene_id = %scene_id, attempt, "Scene still generating");
                wait = self.policy.interval;
                continue;
            }

            if let Some(message) = response.error {
                return Err(PipelineError::JobFailed { scene_id, message });
            }
            return response.result.ok_or_else(|| PipelineError::JobFailed {
                scene_id,
                message: "operation finished without a result".into(),
            });
        }
    }

    fn transition(
        &self,
        status: &mut GenerationStatus,
        next: GenerationState,
    ) -> Result<(), PipelineError> {
        if status.advance(next)? {
            tracing::debug!(scene_id = %status.scene_id, state = %next, "Scene state changed");
            self.observer.status_changed(status);
        }
        Ok(())
    }
}
