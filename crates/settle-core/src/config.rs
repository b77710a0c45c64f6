//! Wait configuration
//!
//! A `WaitConfig` describes one convergence run: which labels are
//! transitional, which are terminal success, and how long and how often to
//! poll. It is built once by the caller and passed by value into the waiter.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::ConfigError;

/// Interval used when neither `min_timeout` nor `poll_interval` is set
pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(100);

/// Default upper bound for the exponential poll interval
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for a single wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    /// Labels that mean "still converging, keep polling"
    pub pending: HashSet<String>,
    /// Labels that mean "done"; empty means done is the resource going away
    pub target: HashSet<String>,
    /// Overall deadline, measured from the start of the wait
    pub timeout: Duration,
    /// Wait before the first probe
    pub delay: Duration,
    /// Floor for the poll interval
    pub min_timeout: Duration,
    /// Fixed poll interval, replaces exponential backoff when set
    pub poll_interval: Option<Duration>,
    /// Cap for the exponential poll interval
    pub max_interval: Duration,
    /// Consecutive target observations required before success
    pub continuous_target_occurrence: u32,
    /// Consecutive "absent" observations tolerated
    pub not_found_checks: u32,
}

impl WaitConfig {
    /// Create a new configuration with default timing
    pub fn new<P, T, S>(pending: P, target: T, timeout: Duration) -> Self
    where
        P: IntoIterator<Item = S>,
        T: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout,
            delay: Duration::ZERO,
            min_timeout: Duration::ZERO,
            poll_interval: None,
            max_interval: DEFAULT_MAX_INTERVAL,
            continuous_target_occurrence: 1,
            not_found_checks: 1,
        }
    }

    /// Set the delay before the first probe
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the poll interval floor
    #[must_use]
    pub fn with_min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    /// Poll at a fixed interval instead of backing off
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Set the backoff cap
    #[must_use]
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Require the target state to be seen `count` times in a row
    #[must_use]
    pub fn with_continuous_target_occurrence(mut self, count: u32) -> Self {
        self.continuous_target_occurrence = count;
        self
    }

    /// Tolerate up to `checks` consecutive absent observations
    #[must_use]
    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Whether success means the resource disappearing
    #[must_use]
    pub fn waits_for_absence(&self) -> bool {
        self.target.is_empty()
    }

    /// Whether `state` is one of the pending labels
    #[must_use]
    pub fn is_pending(&self, state: &str) -> bool {
        self.pending.contains(state)
    }

    /// Whether `state` is one of the target labels
    #[must_use]
    pub fn is_target(&self, state: &str) -> bool {
        self.target.contains(state)
    }

    /// Target labels in a stable order, for error reporting
    #[must_use]
    pub fn expected_states(&self) -> Vec<String> {
        let mut expected: Vec<String> = self.target.iter().cloned().collect();
        expected.sort();
        expected
    }

    /// Check the configuration for values the waiter cannot honor
    ///
    /// # Errors
    /// Returns an error for a zero occurrence/not-found count, a zero
    /// timeout, a zero fixed interval, or a label listed as both pending
    /// and target.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.continuous_target_occurrence == 0 {
            return Err(ConfigError::ZeroCount("continuous_target_occurrence"));
        }
        if self.not_found_checks == 0 {
            return Err(ConfigError::ZeroCount("not_found_checks"));
        }
        if self.poll_interval.is_some_and(|i| i.is_zero()) {
            return Err(ConfigError::ZeroPollInterval);
        }

        let mut overlap: Vec<&String> = self.pending.intersection(&self.target).collect();
        if !overlap.is_empty() {
            overlap.sort();
            return Err(ConfigError::OverlappingStates(
                overlap.into_iter().cloned().collect(),
            ));
        }

        Ok(())
    }
}
