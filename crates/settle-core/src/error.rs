//! Error types for settle-core

use std::time::Duration;

use thiserror::Error;

/// Error returned by a probe, propagated unchanged inside [`WaitError::Probe`]
pub type ProbeError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Rejected wait configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Timeout of zero can never be met
    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    /// A count that must be at least one
    #[error("{0} must be at least 1")]
    ZeroCount(&'static str),

    /// Fixed poll interval of zero would spin
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,

    /// Same label listed as pending and target
    #[error("states listed as both pending and target: {0:?}")]
    OverlappingStates(Vec<String>),
}

/// Coarse classification of a [`WaitError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitErrorKind {
    InvalidConfig,
    Probe,
    UnexpectedState,
    UnexpectedAbsence,
    Timeout,
    Cancelled,
}

impl std::fmt::Display for WaitErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitErrorKind::InvalidConfig => write!(f, "invalid_config"),
            WaitErrorKind::Probe => write!(f, "probe"),
            WaitErrorKind::UnexpectedState => write!(f, "unexpected_state"),
            WaitErrorKind::UnexpectedAbsence => write!(f, "unexpected_absence"),
            WaitErrorKind::Timeout => write!(f, "timeout"),
            WaitErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors that end a wait without convergence
///
/// Every runtime variant carries the last payload the probe returned (if
/// any) so callers can still inspect the resource after a failed wait.
#[derive(Error, Debug)]
pub enum WaitError<T> {
    /// Configuration rejected before the first probe
    #[error("invalid wait configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The probe itself returned an error
    #[error("probe failed: {source}")]
    Probe {
        /// Error returned by the probe
        #[source]
        source: ProbeError,
        /// Label seen before the failing probe
        last_state: Option<String>,
        /// Payload seen before the failing probe
        payload: Option<T>,
    },

    /// A label outside both the pending and target sets was observed
    #[error("unexpected state '{state}', wanted {}", describe_expected(.expected))]
    UnexpectedState {
        /// Observed label
        state: String,
        /// Target labels
        expected: Vec<String>,
        /// Payload returned alongside the label
        payload: Option<T>,
    },

    /// The resource disappeared while a target state was expected
    #[error("resource not found after {checks} consecutive checks, wanted {}", describe_expected(.expected))]
    UnexpectedAbsence {
        /// Consecutive absent observations
        checks: u32,
        /// Target labels
        expected: Vec<String>,
        /// Last label seen before the resource vanished
        last_state: Option<String>,
        /// Last payload seen before the resource vanished
        payload: Option<T>,
    },

    /// The deadline passed before convergence
    #[error(
        "timeout after {timeout:?} waiting for {} (last state: '{}')",
        describe_expected(.expected),
        .last_state.as_deref().unwrap_or("none")
    )]
    Timeout {
        /// Configured deadline
        timeout: Duration,
        /// Target labels
        expected: Vec<String>,
        /// Last observed label
        last_state: Option<String>,
        /// Last observed payload
        payload: Option<T>,
    },

    /// The caller cancelled the wait
    #[error("wait cancelled (last state: '{}')", .last_state.as_deref().unwrap_or("none"))]
    Cancelled {
        /// Last observed label
        last_state: Option<String>,
        /// Last observed payload
        payload: Option<T>,
    },
}

fn describe_expected(expected: &[String]) -> String {
    if expected.is_empty() {
        "resource to be absent".to_string()
    } else {
        format!("state in {expected:?}")
    }
}

impl<T> WaitError<T> {
    /// Classification of this error
    #[must_use]
    pub fn kind(&self) -> WaitErrorKind {
        match self {
            WaitError::InvalidConfig(_) => WaitErrorKind::InvalidConfig,
            WaitError::Probe { .. } => WaitErrorKind::Probe,
            WaitError::UnexpectedState { .. } => WaitErrorKind::UnexpectedState,
            WaitError::UnexpectedAbsence { .. } => WaitErrorKind::UnexpectedAbsence,
            WaitError::Timeout { .. } => WaitErrorKind::Timeout,
            WaitError::Cancelled { .. } => WaitErrorKind::Cancelled,
        }
    }

    /// Check if the deadline was exceeded
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }

    /// Check if the wait was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, WaitError::Cancelled { .. })
    }

    /// Last observed payload, if any
    #[must_use]
    pub fn payload(&self) -> Option<&T> {
        match self {
            WaitError::InvalidConfig(_) => None,
            WaitError::Probe { payload, .. }
            | WaitError::UnexpectedState { payload, .. }
            | WaitError::UnexpectedAbsence { payload, .. }
            | WaitError::Timeout { payload, .. }
            | WaitError::Cancelled { payload, .. } => payload.as_ref(),
        }
    }

    /// Consume the error, keeping the last observed payload
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        match self {
            WaitError::InvalidConfig(_) => None,
            WaitError::Probe { payload, .. }
            | WaitError::UnexpectedState { payload, .. }
            | WaitError::UnexpectedAbsence { payload, .. }
            | WaitError::Timeout { payload, .. }
            | WaitError::Cancelled { payload, .. } => payload,
        }
    }

    /// Last observed label, if any
    #[must_use]
    pub fn last_state(&self) -> Option<&str> {
        match self {
            WaitError::InvalidConfig(_) => None,
            WaitError::UnexpectedState { state, .. } => Some(state),
            WaitError::Probe { last_state, .. }
            | WaitError::UnexpectedAbsence { last_state, .. }
            | WaitError::Timeout { last_state, .. }
            | WaitError::Cancelled { last_state, .. } => last_state.as_deref(),
        }
    }
}
