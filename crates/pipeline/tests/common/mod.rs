//! In-memory fakes shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reelforge_core::composition::CompositionSpec;
use reelforge_core::compositor::{CompositionFailure, MediaCompositor, ProgressFn};
use reelforge_core::generation::{GenerationState, GenerationStatus};
use reelforge_core::service::{
    GenerationRequest, GenerationService, OperationHandle, PollResponse, ServiceError,
    SubmitResponse,
};
use reelforge_core::types::{Artifact, ArtifactRef, ReferenceImage, SceneId, TransitionKind};
use reelforge_pipeline::poll::{BackoffConfig, PollPolicy};
use reelforge_pipeline::{PipelineConfig, StatusObserver};

// ---------------------------------------------------------------------------
// Generation service
// ---------------------------------------------------------------------------

/// How the fake answers for one submission, in submission order.
#[derive(Debug, Clone)]
pub enum Script {
    /// Report "running" this many times, then succeed.
    Succeed { pending_polls: usize },
    /// Submission already reports done.
    DoneOnSubmit,
    /// Reject the submission with an API error.
    RejectSubmit,
    /// The job finishes with this error.
    JobError(String),
    /// Poll requests fail this many times, then succeed.
    FlakyPolls(usize),
    /// Poll never reports done.
    NeverFinishes,
    /// The job succeeds but its artifact cannot be downloaded.
    FetchFails,
}

struct Operation {
    script: Script,
    polls: usize,
}

#[derive(Default)]
pub struct FakeService {
    scripts: Mutex<VecDeque<Script>>,
    operations: Mutex<HashMap<String, Operation>>,
    failing_descriptions: HashSet<String>,
    blank_descriptions: HashSet<String>,
    pub submissions: Mutex<Vec<GenerationRequest>>,
    pub describe_calls: Mutex<Vec<String>>,
    pub poll_count: Mutex<usize>,
}

impl FakeService {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn failing_description_for(mut self, name: &str) -> Self {
        self.failing_descriptions.insert(name.to_string());
        self
    }

    /// Describe `name` as whitespace only.
    pub fn blank_description_for(mut self, name: &str) -> Self {
        self.blank_descriptions.insert(name.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.directive_prompt.clone())
            .collect()
    }

    pub fn describe_count(&self) -> usize {
        self.describe_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for FakeService {
    async fn submit(&self, request: &GenerationRequest) -> Result<SubmitResponse, ServiceError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script::Succeed { pending_polls: 0 });
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());

        if matches!(script, Script::RejectSubmit) {
            return Err(ServiceError::Api {
                status: 400,
                body: "prompt rejected".into(),
            });
        }

        let name = format!("op-{}", submissions.len());
        let done = matches!(script, Script::DoneOnSubmit);
        self.operations
            .lock()
            .unwrap()
            .insert(name.clone(), Operation { script, polls: 0 });
        Ok(SubmitResponse {
            operation_handle: OperationHandle(name),
            done,
        })
    }

    async fn poll(&self, handle: &OperationHandle) -> Result<PollResponse, ServiceError> {
        *self.poll_count.lock().unwrap() += 1;
        let mut operations = self.operations.lock().unwrap();
        let op = operations
            .get_mut(&handle.0)
            .ok_or_else(|| ServiceError::Api {
                status: 404,
                body: "unknown operation".into(),
            })?;
        op.polls += 1;

        let artifact = ArtifactRef::new(format!("files/{}.mp4", handle.0));
        match &op.script {
            Script::Succeed { pending_polls } if op.polls <= *pending_polls => {
                Ok(PollResponse::running())
            }
            Script::Succeed { .. } | Script::DoneOnSubmit => Ok(PollResponse::succeeded(artifact)),
            Script::FlakyPolls(failures) if op.polls <= *failures => {
                Err(ServiceError::Transport("connection reset".into()))
            }
            Script::FlakyPolls(_) => Ok(PollResponse::succeeded(artifact)),
            Script::JobError(message) => Ok(PollResponse::failed(message.clone())),
            Script::NeverFinishes => Ok(PollResponse::running()),
            Script::FetchFails => Ok(PollResponse::succeeded(ArtifactRef::new(format!(
                "missing/{}.mp4",
                handle.0
            )))),
            Script::RejectSubmit => unreachable!("rejected submissions have no operation"),
        }
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Artifact, ServiceError> {
        if artifact.as_str().starts_with("missing/") {
            return Err(ServiceError::Api {
                status: 404,
                body: "gone".into(),
            });
        }
        Ok(Artifact::new(
            artifact.clone(),
            "video/mp4",
            artifact.as_str().as_bytes().to_vec(),
        ))
    }

    async fn describe_character(
        &self,
        name: &str,
        _image: &ReferenceImage,
    ) -> Result<String, ServiceError> {
        self.describe_calls.lock().unwrap().push(name.to_string());
        if self.failing_descriptions.contains(name) {
            return Err(ServiceError::Transport("describe timed out".into()));
        }
        if self.blank_descriptions.contains(name) {
            return Ok("   ".into());
        }
        Ok(format!("{name}: tall, red wool coat, silver bob"))
    }
}

// ---------------------------------------------------------------------------
// Compositor
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeCompositor {
    pub calls: Mutex<Vec<(Vec<SceneId>, Vec<TransitionKind>)>>,
}

#[async_trait]
impl MediaCompositor for FakeCompositor {
    async fn compose(
        &self,
        spec: &CompositionSpec,
        progress: ProgressFn<'_>,
    ) -> Result<Artifact, CompositionFailure> {
        self.calls.lock().unwrap().push((
            spec.entries().iter().map(|e| e.scene_id).collect(),
            spec.transitions(),
        ));
        progress(0.5);
        progress(1.0);
        let data = spec
            .entries()
            .iter()
            .flat_map(|e| e.artifact.data.clone())
            .collect();
        Ok(Artifact::new(ArtifactRef::new("composed"), "video/mp4", data))
    }
}

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(SceneId, GenerationState)>>,
    pub progress: Mutex<Vec<f64>>,
    pub finished: Mutex<usize>,
}

impl RecordingObserver {
    pub fn states_for(&self, scene_id: SceneId) -> Vec<GenerationState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == scene_id)
            .map(|(_, state)| *state)
            .collect()
    }
}

impl StatusObserver for RecordingObserver {
    fn status_changed(&self, status: &GenerationStatus) {
        self.transitions
            .lock()
            .unwrap()
            .push((status.scene_id, status.state));
    }

    fn run_finished(&self, _outcome: &reelforge_pipeline::RunOutcome) {
        *self.finished.lock().unwrap() += 1;
    }

    fn composition_progress(&self, fraction: f64) {
        self.progress.lock().unwrap().push(fraction);
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration with no waiting between polls.
pub fn instant_config() -> PipelineConfig {
    PipelineConfig {
        poll: PollPolicy {
            interval: Duration::ZERO,
            timeout: None,
            max_consecutive_failures: 3,
            backoff: BackoffConfig {
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                multiplier: 2.0,
            },
        },
        ..Default::default()
    }
}
