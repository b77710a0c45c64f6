//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Stderr with surrounding whitespace removed, for error messages
    #[must_use]
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: i32, stdout: &str, stderr: &str) -> CommandResult {
        CommandResult {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            duration: Duration::from_millis(3),
        }
    }

    #[test]
    fn test_success() {
        assert!(result(0, "ACTIVE\n", "").success());
        assert!(!result(1, "", "boom").success());
    }

    #[test]
    fn test_stderr_trimmed() {
        assert_eq!(result(2, "", "  not found\n").stderr_trimmed(), "not found");
    }
}
