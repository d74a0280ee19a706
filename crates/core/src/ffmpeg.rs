//! FFmpeg/FFprobe command utilities.
//!
//! Thin async wrappers around the `ffprobe` and `ffmpeg` binaries used by
//! the composition stage: stream probing, and running a render while
//! turning ffmpeg's `-progress` key/value output into a fraction.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Non-progress stderr lines kept for error diagnostics.
const STDERR_TAIL_LINES: usize = 20;

/// Failure running `ffmpeg` or `ffprobe`.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    /// The executable could not be spawned.
    #[error("cannot start {program}: {source}")]
    NotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully. `stderr` holds the
    /// diagnostic tail.
    #[error("{program} exited with {exit_code:?}: {stderr}")]
    ExecutionFailed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("unreadable probe report: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("no such media file: {}", .0.display())]
    MediaNotFound(PathBuf),
}

// ---------------------------------------------------------------------------
// Probing
// ---------------------------------------------------------------------------

/// The subset of `ffprobe -show_format -show_streams` JSON that composition
/// looks at.
#[derive(Debug, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    #[serde(default)]
    pub format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeFormat {
    pub duration: Option<String>,
}

/// Probe a media file with `ffprobe`.
pub async fn probe_media(ffprobe_bin: &str, path: &Path) -> Result<ProbeReport, FfmpegError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Err(FfmpegError::MediaNotFound(path.to_path_buf()));
    }

    let output = tokio::process::Command::new(ffprobe_bin)
        .args(["-v", "error", "-of", "json", "-show_format", "-show_streams"])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| FfmpegError::NotFound {
            program: ffprobe_bin.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            program: ffprobe_bin.to_string(),
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    serde_json::from_slice::<ProbeReport>(&output.stdout)
        .map_err(|e| FfmpegError::ParseError(e.to_string()))
}

/// Media duration in seconds, from the format or the first video stream.
pub fn parse_duration(probe: &ProbeReport) -> f64 {
    if let Some(secs) = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
    {
        return secs;
    }
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Whether the file carries at least one audio stream.
pub fn has_audio_stream(probe: &ProbeReport) -> bool {
    probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"))
}

// ---------------------------------------------------------------------------
// Rendering with progress
// ---------------------------------------------------------------------------

/// A parsed line of ffmpeg `-progress` output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    /// Output timestamp reached, in seconds.
    OutTime(f64),
    /// `progress=end`.
    End,
}

/// Parse one `key=value` line of ffmpeg `-progress` output.
///
/// Both `out_time_us` and `out_time_ms` carry microseconds (the latter is
/// misnamed by ffmpeg). Returns `None` for every other line.
pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value
            .parse::<i64>()
            .ok()
            .map(|us| ProgressLine::OutTime(us.max(0) as f64 / 1_000_000.0)),
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// Whether a stderr line belongs to the `-progress` block.
fn is_progress_key(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame", "fps", "stream_", "bitrate", "total_size", "out_time", "dup_frames",
        "drop_frames", "speed", "progress",
    ];
    line.split_once('=')
        .is_some_and(|(k, _)| KEYS.iter().any(|p| k.starts_with(p)))
}

/// Run ffmpeg with `args`, reporting progress against `expected_secs`.
///
/// `-progress pipe:2 -nostats` is appended by this function; callers pass
/// only inputs, filters, encoder settings and the output path. Progress is
/// clamped to `0.0..=1.0`, never decreases, and ends at `1.0` on success.
pub async fn run_with_progress<F>(
    ffmpeg_bin: &str,
    args: &[String],
    expected_secs: f64,
    on_progress: F,
) -> Result<(), FfmpegError>
where
    F: Fn(f64),
{
    tracing::debug!(bin = ffmpeg_bin, args = ?args, expected_secs, "Running ffmpeg");
    let mut child = tokio::process::Command::new(ffmpeg_bin)
        .args(["-hide_banner", "-loglevel", "error", "-nostats", "-progress", "pipe:2"])
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| FfmpegError::NotFound {
            program: ffmpeg_bin.to_string(),
            source,
        })?;

    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut reported = 0.0f64;

    if let Some(stderr) = child.stderr.take() {
        let mut lines = BufReader::new(stderr).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_progress_line(&line) {
                Some(ProgressLine::OutTime(secs)) if expected_secs > 0.0 => {
                    let fraction = (secs / expected_secs).clamp(0.0, 1.0);
                    if fraction > reported {
                        reported = fraction;
                        on_progress(fraction);
                    }
                }
                Some(_) => {}
                None if is_progress_key(&line) => {}
                None => {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        }
    }

    let status = child.wait().await?;
    if !status.success() {
        tracing::warn!(exit_code = ?status.code(), "ffmpeg exited with failure");
        return Err(FfmpegError::ExecutionFailed {
            program: ffmpeg_bin.to_string(),
            exit_code: status.code(),
            stderr: tail.into_iter().collect::<Vec<_>>().join("\n"),
        });
    }

    if reported < 1.0 {
        on_progress(1.0);
    }
    Ok(())
}
