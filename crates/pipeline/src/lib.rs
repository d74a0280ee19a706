//! Continuity-aware story-to-film pipeline.
//!
//! A run takes a [`Session`], resolves missing character descriptions,
//! generates one clip per scene strictly in order through a
//! [`GenerationService`], and hands the completed clips to a
//! [`MediaCompositor`]. Progress is reported to a [`StatusObserver`].

pub mod compositor;
pub mod config;
pub mod driver;
pub mod error;
pub mod observer;
pub mod poll;
pub mod precheck;
pub mod sequencer;
pub mod session;

use std::sync::Arc;

use reelforge_core::compositor::MediaCompositor;
use reelforge_core::service::GenerationService;
use reelforge_core::types::Artifact;
use tokio_util::sync::CancellationToken;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use observer::{FnObserver, NoopObserver, StatusObserver};
pub use sequencer::{RunOutcome, Sequencer};
pub use session::{RunSnapshot, Session};

/// Generation service, compositor and observer wired together.
pub struct Pipeline {
    service: Arc<dyn GenerationService>,
    compositor: Arc<dyn MediaCompositor>,
    observer: Arc<dyn StatusObserver>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        service: Arc<dyn GenerationService>,
        compositor: Arc<dyn MediaCompositor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            service,
            compositor,
            observer: Arc::new(NoopObserver),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Generate every scene of `session`. See [`Sequencer::run`].
    pub async fn run(&self, session: &mut Session) -> RunOutcome {
        self.sequencer().run(session).await
    }

    /// Like [`run`](Self::run), stopping between scenes once `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        session: &mut Session,
        cancel: CancellationToken,
    ) -> RunOutcome {
        self.sequencer().with_cancellation(cancel).run(session).await
    }

    /// Compose the completed clips of `outcome` in the session's current
    /// scene order.
    ///
    /// Only call after a successful run; a failed or cancelled run is
    /// rejected so that a partial film is never produced by accident.
    pub async fn compose(
        &self,
        session: &Session,
        outcome: &RunOutcome,
    ) -> Result<Artifact, PipelineError> {
        if let Some(err) = &outcome.failure {
            return Err(PipelineError::NotComposable(format!("run failed: {err}")));
        }
        if outcome.cancelled {
            return Err(PipelineError::NotComposable("run was cancelled".into()));
        }

        let spec = outcome.composition_spec(&session.scenes);
        let observer = Arc::clone(&self.observer);
        let progress = move |fraction: f64| observer.composition_progress(fraction);

        tracing::info!(clips = spec.len(), "Composing film");
        let artifact = self.compositor.compose(&spec, &progress).await?;
        Ok(artifact)
    }

    fn sequencer(&self) -> Sequencer<'_> {
        Sequencer::new(
            self.service.as_ref(),
            &self.config,
            self.observer.as_ref(),
        )
    }
}
