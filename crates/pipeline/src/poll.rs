//! Poll timing: fixed spacing between "still running" answers and
//! exponential backoff between failed poll requests.

use std::time::Duration;

use reelforge_core::generation::DEFAULT_POLL_INTERVAL_SECS;

/// Default number of consecutive failed polls before a scene errors.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 5;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failed poll.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`BackoffConfig::max_delay`].
pub fn next_delay(current: Duration, config: &BackoffConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// How a scene's operation is polled to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Wait between a "not done" answer and the next poll.
    pub interval: Duration,
    /// Give up once this much time has passed since submission.
    pub timeout: Option<Duration>,
    /// Consecutive failed poll requests tolerated before erroring.
    pub max_consecutive_failures: u32,
    pub backoff: BackoffConfig,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeout: None,
            max_consecutive_failures: DEFAULT_MAX_POLL_FAILURES,
            backoff: BackoffConfig::default(),
        }
    }
}

/// Tracks consecutive poll failures and the backoff delay between them.
#[derive(Debug)]
pub struct FailureTracker<'a> {
    policy: &'a PollPolicy,
    consecutive: u32,
    delay: Duration,
}

impl<'a> FailureTracker<'a> {
    pub fn new(policy: &'a PollPolicy) -> Self {
        Self {
            policy,
            consecutive: 0,
            delay: policy.backoff.initial_delay,
        }
    }

    /// Record a failed poll. Returns the delay before retrying, or `None`
    /// once the failure limit is reached.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.consecutive += 1;
        if self.consecutive >= self.policy.max_consecutive_failures.max(1) {
            return None;
        }
        let wait = self.delay;
        self.delay = next_delay(self.delay, &self.policy.backoff);
        Some(wait)
    }

    /// A poll got an answer; start counting from zero again.
    pub fn reset(&mut self) {
        self.consecutive = 0;
        self.delay = self.policy.backoff.initial_delay;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
