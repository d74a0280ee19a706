//! `reelforge-worker` -- turns a story file into a film.
//!
//! Loads the story, generates one clip per scene through the remote
//! generation service, composes the clips with ffmpeg and writes the
//! result. Ctrl-C stops the run before the next scene starts.
//!
//! ```text
//! reelforge-worker <story.json> [output.mp4]
//! ```
//!
//! # Environment variables
//!
//! | Variable               | Required | Default   | Description                              |
//! |------------------------|----------|-----------|------------------------------------------|
//! | `GENAPI_BASE_URL`      | yes      | --        | Generation service root URL              |
//! | `GENAPI_KEY`           | no       | --        | API key sent as `x-api-key`              |
//! | `GENAPI_TIMEOUT_SECS`  | no       | `60`      | Per-request timeout                      |
//! | `POLL_INTERVAL_SECS`   | no       | `10`      | Seconds between operation polls          |
//! | `POLL_TIMEOUT_SECS`    | no       | --        | Give up polling one scene after this     |
//! | `MAX_POLL_FAILURES`    | no       | `5`       | Consecutive failed polls before erroring |
//! | `DESCRIBE_CONCURRENCY` | no       | `4`       | Parallel character description requests |
//! | `CLIP_CONTENT_SECS`    | no       | `7`       | Content seconds per clip                 |
//! | `TRANSITION_SECS`      | no       | `1`       | Transition length                        |
//! | `FFMPEG_BIN`           | no       | `ffmpeg`  | ffmpeg executable                        |
//! | `FFPROBE_BIN`          | no       | `ffprobe` | ffprobe executable                       |

mod story;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use reelforge_events::{EventBus, EventKind, PipelineEvent};
use reelforge_genapi::GenApiConfig;
use reelforge_pipeline::compositor::FfmpegCompositor;
use reelforge_pipeline::{Pipeline, PipelineConfig, Session};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Output path used when none is given.
const DEFAULT_OUTPUT: &str = "film.mp4";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reelforge_worker=info,reelforge_pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %format!("{e:#}"), "Worker failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let story_path = args
        .next()
        .map(PathBuf::from)
        .context("usage: reelforge-worker <story.json> [output.mp4]")?;
    let output_path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let client = GenApiConfig::from_env()?.into_client()?;
    let config = PipelineConfig::from_env()?;
    let mut session = story::load_session(&story_path).await?;

    tracing::info!(
        story = %story_path.display(),
        scenes = session.scenes.len(),
        characters = session.characters.len(),
        service = client.base_url(),
        "Starting reelforge-worker",
    );

    let bus = Arc::new(EventBus::default());
    let listener = tokio::spawn(log_events(bus.subscribe()));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping after the current scene");
                cancel.cancel();
            }
        });
    }

    let compositor = FfmpegCompositor::new(config.compositor.clone());
    let pipeline = Pipeline::new(Arc::new(client), Arc::new(compositor), config)
        .with_observer(bus.clone());

    let result = produce(&pipeline, &mut session, cancel, &output_path).await;

    // Closing the bus lets the logger drain what is still buffered.
    drop(pipeline);
    drop(bus);
    match listener.await {
        Ok(logged) => tracing::debug!(events = logged, "Event log closed"),
        Err(e) => tracing::warn!(error = %e, "Event logger stopped abnormally"),
    }
    result
}

/// Run the session, compose the clips and write the film.
async fn produce(
    pipeline: &Pipeline,
    session: &mut Session,
    cancel: CancellationToken,
    output_path: &Path,
) -> anyhow::Result<()> {
    let outcome = pipeline.run_with_cancellation(session, cancel).await;
    if !outcome.is_success() {
        anyhow::bail!(outcome.summary());
    }

    let film = pipeline.compose(session, &outcome).await?;
    tokio::fs::write(output_path, &film.data)
        .await
        .with_context(|| format!("writing {}", output_path.display()))?;

    tracing::info!(
        output = %output_path.display(),
        bytes = film.data.len(),
        "Film written",
    );
    Ok(())
}

/// Log pipeline events until the bus is dropped.
///
/// Returns the number of events logged.
async fn log_events(mut rx: broadcast::Receiver<PipelineEvent>) -> usize {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                logged += 1;
                log_event(event);
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log lagging");
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}

fn log_event(event: PipelineEvent) {
    match event.kind {
        EventKind::SceneStatus {
            scene_id,
            state,
            error_message,
            ..
        } => {
            tracing::info!(
                scene_id = %scene_id,
                state = %state,
                error = error_message.as_deref().unwrap_or_default(),
                "Scene status",
            );
        }
        EventKind::CharacterLocked { name, .. } => {
            tracing::info!(character = %name, "Character locked");
        }
        EventKind::CompositionProgress { fraction } => {
            tracing::debug!(progress = fraction, "Composition progress");
        }
        EventKind::RunFinished {
            counts, cancelled, ..
        } => {
            tracing::info!(
                complete = counts.complete,
                error = counts.error,
                pending = counts.pending,
                cancelled,
                "Run finished",
            );
        }
        EventKind::RunStarted { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logger_drains_buffered_events_after_the_bus_closes() {
        let bus = EventBus::default();
        let listener = tokio::spawn(log_events(bus.subscribe()));

        bus.publish(PipelineEvent::new(EventKind::RunStarted { scene_count: 2 }));
        bus.publish(PipelineEvent::new(EventKind::CompositionProgress { fraction: 0.5 }));
        bus.publish(PipelineEvent::new(EventKind::RunFinished {
            counts: Default::default(),
            cancelled: false,
            error: None,
            failed_scene: None,
        }));
        drop(bus);

        assert_eq!(listener.await.unwrap(), 3);
    }
}
