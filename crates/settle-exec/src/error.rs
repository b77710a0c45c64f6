//! Error types for settle-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a probe command
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Command exited with a status that does not map to an observation
    #[error("command execution failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Command output could not be turned into a state label
    #[error("invalid command output: {0}")]
    InvalidOutput(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = ExecError::Timeout {
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "command timed out after 30s");
    }

    #[test]
    fn test_display() {
        let err = ExecError::CommandFailed {
            status: 255,
            stderr: "AccessDenied".to_string(),
        };
        assert_eq!(err.to_string(), "command execution failed: 255 - AccessDenied");
    }
}
