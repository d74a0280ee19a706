use std::time::Duration;

use reelforge_core::composition::{
    CompositionTiming, DEFAULT_CONTENT_DURATION_SECS, DEFAULT_TRANSITION_DURATION_SECS,
};
use reelforge_core::generation::DEFAULT_POLL_INTERVAL_SECS;

use crate::error::PipelineError;
use crate::poll::{PollPolicy, DEFAULT_MAX_POLL_FAILURES};

/// Default number of character descriptions resolved at once.
pub const DEFAULT_DESCRIBE_CONCURRENCY: usize = 4;

/// Settings for the ffmpeg-backed compositor.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub timing: CompositionTiming,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".into(),
            ffprobe_bin: "ffprobe".into(),
            timing: CompositionTiming::default(),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub poll: PollPolicy,
    /// Upper bound on concurrent character description requests.
    pub describe_concurrency: usize,
    pub compositor: CompositorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            describe_concurrency: DEFAULT_DESCRIBE_CONCURRENCY,
            compositor: CompositorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default     |
    /// |------------------------|-------------|
    /// | `POLL_INTERVAL_SECS`   | `10`        |
    /// | `POLL_TIMEOUT_SECS`    | *(none)*    |
    /// | `MAX_POLL_FAILURES`    | `5`         |
    /// | `DESCRIBE_CONCURRENCY` | `4`         |
    /// | `CLIP_CONTENT_SECS`    | `7`         |
    /// | `TRANSITION_SECS`      | `1`         |
    /// | `FFMPEG_BIN`           | `ffmpeg`    |
    /// | `FFPROBE_BIN`          | `ffprobe`   |
    pub fn from_env() -> Result<Self, PipelineError> {
        let interval_secs: u64 = parse_var("POLL_INTERVAL_SECS")?.unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        let timeout_secs: Option<u64> = parse_var("POLL_TIMEOUT_SECS")?;
        let max_failures: u32 = parse_var("MAX_POLL_FAILURES")?.unwrap_or(DEFAULT_MAX_POLL_FAILURES);
        let describe_concurrency: usize =
            parse_var("DESCRIBE_CONCURRENCY")?.unwrap_or(DEFAULT_DESCRIBE_CONCURRENCY);

        let timing = CompositionTiming {
            content_duration_secs: parse_var("CLIP_CONTENT_SECS")?
                .unwrap_or(DEFAULT_CONTENT_DURATION_SECS),
            transition_duration_secs: parse_var("TRANSITION_SECS")?
                .unwrap_or(DEFAULT_TRANSITION_DURATION_SECS),
        };
        timing
            .validate()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        if describe_concurrency == 0 {
            return Err(PipelineError::Config(
                "DESCRIBE_CONCURRENCY must be at least 1".into(),
            ));
        }

        let defaults = CompositorConfig::default();
        let compositor = CompositorConfig {
            ffmpeg_bin: std::env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: std::env::var("FFPROBE_BIN").unwrap_or(defaults.ffprobe_bin),
            timing,
        };

        Ok(Self {
            poll: PollPolicy {
                interval: Duration::from_secs(interval_secs),
                timeout: timeout_secs.map(Duration::from_secs),
                max_consecutive_failures: max_failures,
                ..Default::default()
            },
            describe_concurrency,
            compositor,
        })
    }
}

/// Read and parse an optional variable. Unset or blank is `None`; an
/// unparsable value is a configuration error.
fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, PipelineError> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(|_| {
            PipelineError::Config(format!("{name} has an invalid value: {raw:?}"))
        }),
        _ => Ok(None),
    }
}
