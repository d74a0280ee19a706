//! ffmpeg-backed [`MediaCompositor`].
//!
//! Clips are written to a private temporary directory, probed for audio
//! and duration, joined with the transition filter graph and rendered to a
//! single MP4. The directory is removed when composition ends, whether it
//! succeeded or not.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reelforge_core::composition::{
    CompositionSpec, FilterGraph, AUDIO_OUTPUT_LABEL, VIDEO_OUTPUT_LABEL,
};
use reelforge_core::compositor::{CompositionFailure, MediaCompositor, ProgressFn};
use reelforge_core::ffmpeg;
use reelforge_core::types::{Artifact, ArtifactRef};

use crate::config::CompositorConfig;

/// Reference given to the composed film.
pub const COMPOSED_ARTIFACT_REF: &str = "composed/film.mp4";

/// Accepted drift between a probed clip and the expected clip length.
const DURATION_TOLERANCE_SECS: f64 = 0.25;

pub struct FfmpegCompositor {
    config: CompositorConfig,
}

impl FfmpegCompositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self { config }
    }

    /// Arguments for the render, excluding the progress flags added by
    /// [`ffmpeg::run_with_progress`].
    pub fn render_args(inputs: &[PathBuf], graph: &FilterGraph, output: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(inputs.len() * 2 + 16);
        for input in inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }
        args.push("-filter_complex".into());
        args.push(graph.to_filter_complex());
        args.push("-map".into());
        args.push(format!("[{VIDEO_OUTPUT_LABEL}]"));
        if graph.has_audio() {
            args.push("-map".into());
            args.push(format!("[{AUDIO_OUTPUT_LABEL}]"));
            args.extend(["-c:a".into(), "aac".into()]);
        }
        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
            "-y".into(),
        ]);
        args.push(output.to_string_lossy().to_string());
        args
    }

    async fn compose_many(
        &self,
        spec: &CompositionSpec,
        progress: ProgressFn<'_>,
    ) -> Result<Artifact, CompositionFailure> {
        let timing = &self.config.timing;
        let workdir = tempfile::tempdir()
            .map_err(|e| CompositionFailure::new(format!("cannot create work directory: {e}")))?;

        let mut inputs = Vec::with_capacity(spec.len());
        for (i, entry) in spec.entries().iter().enumerate() {
            let path = workdir
                .path()
                .join(format!("clip_{i:03}.{}", extension_for(&entry.artifact.mime_type)));
            tokio::fs::write(&path, &entry.artifact.data)
                .await
                .map_err(|e| CompositionFailure::new(format!("cannot write clip {i}: {e}")))?;
            inputs.push(path);
        }

        let mut all_audio = true;
        let expected = timing.expected_clip_secs();
        for (i, path) in inputs.iter().enumerate() {
            let probe = ffmpeg::probe_media(&self.config.ffprobe_bin, path)
                .await
                .map_err(|e| CompositionFailure::new(format!("probe of clip {i} failed: {e}")))?;
            all_audio &= ffmpeg::has_audio_stream(&probe);

            let duration = ffmpeg::parse_duration(&probe);
            if (duration - expected).abs() > DURATION_TOLERANCE_SECS {
                tracing::warn!(
                    clip = i,
                    duration_secs = duration,
                    expected_secs = expected,
                    "Clip length differs from the composition timing; transitions may drift",
                );
            }
        }

        let graph = FilterGraph::build(&spec.transitions(), timing, all_audio)
            .map_err(|e| CompositionFailure::new(e.to_string()))?;
        let output = workdir.path().join("film.mp4");
        let args = Self::render_args(&inputs, &graph, &output);
        let expected_output = timing.expected_output_secs(spec.len());

        tracing::info!(
            clips = spec.len(),
            audio = all_audio,
            expected_secs = expected_output,
            "Rendering composition",
        );

        ffmpeg::run_with_progress(&self.config.ffmpeg_bin, &args, expected_output, |p| progress(p))
            .await
            .map_err(|e| CompositionFailure::new(e.to_string()))?;

        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| CompositionFailure::new(format!("cannot read rendered film: {e}")))?;
        if data.is_empty() {
            return Err(CompositionFailure::new("ffmpeg produced an empty file"));
        }

        tracing::info!(bytes = data.len(), "Composition rendered");
        Ok(Artifact::new(
            ArtifactRef::new(COMPOSED_ARTIFACT_REF),
            "video/mp4",
            data,
        ))
    }
}

#[async_trait]
impl MediaCompositor for FfmpegCompositor {
    async fn compose(
        &self,
        spec: &CompositionSpec,
        progress: ProgressFn<'_>,
    ) -> Result<Artifact, CompositionFailure> {
        match spec.entries() {
            [] => Err(CompositionFailure::new("no clips to compose")),
            [only] => {
                progress(1.0);
                Ok(only.artifact.clone())
            }
            _ => self.compose_many(spec, progress).await,
        }
    }
}

/// File extension ffmpeg should see for a clip's content type.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "video/x-matroska" => "mkv",
        _ => "mp4",
    }
}
