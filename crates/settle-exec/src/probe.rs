//! Command-backed probe
//!
//! `CommandProbe` runs a shell command on every poll and reads the state
//! label from what it prints: either the whole trimmed stdout, or a string
//! field inside JSON output selected with a JSON pointer. Exit statuses
//! listed as "absent" report the resource as not found, which is how most
//! cloud CLIs signal a missing resource.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use settle_core::{Observation, Probe, ProbeError};
use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::CommandExecutor;

/// Payload produced by a [`CommandProbe`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeOutput {
    /// State label read from the output
    pub state: String,
    /// Raw stdout of the probe command
    pub stdout: String,
    /// Parsed stdout, when a JSON pointer is configured
    pub json: Option<Value>,
}

/// Probe that shells out to a status command
pub struct CommandProbe {
    executor: Arc<dyn CommandExecutor>,
    command: String,
    json_pointer: Option<String>,
    absent_exit_codes: Vec<i32>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CommandProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandProbe")
            .field("executor", &self.executor.executor_type())
            .field("command", &self.command)
            .field("json_pointer", &self.json_pointer)
            .field("absent_exit_codes", &self.absent_exit_codes)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommandProbe {
    /// Create a probe running `command` through `executor`
    pub fn new(executor: Arc<dyn CommandExecutor>, command: impl Into<String>) -> Self {
        Self {
            executor,
            command: command.into(),
            json_pointer: None,
            absent_exit_codes: Vec::new(),
            timeout: None,
        }
    }

    /// Read the state from this JSON pointer (e.g. `/Cluster/Status`)
    #[must_use]
    pub fn with_json_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.json_pointer = Some(pointer.into());
        self
    }

    /// Treat this exit status as "resource not found"
    #[must_use]
    pub fn with_absent_exit_code(mut self, code: i32) -> Self {
        if !self.absent_exit_codes.contains(&code) {
            self.absent_exit_codes.push(code);
        }
        self
    }

    /// Kill the command if a single probe takes longer than `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the command
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Check the probe settings before polling
    ///
    /// # Errors
    /// Returns [`ExecError::ConfigError`] for an empty command, a JSON pointer
    /// that does not start with `/`, an absent exit code of 0, or a zero
    /// per-probe timeout.
    pub fn validate(&self) -> Result<(), ExecError> {
        if self.command.trim().is_empty() {
            return Err(ExecError::ConfigError("probe command is empty".to_string()));
        }
        if let Some(pointer) = &self.json_pointer
            && !pointer.is_empty()
            && !pointer.starts_with('/')
        {
            return Err(ExecError::ConfigError(format!(
                "JSON pointer must start with '/': {pointer}"
            )));
        }
        if self.absent_exit_codes.contains(&0) {
            return Err(ExecError::ConfigError(
                "exit code 0 cannot mean absent".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(ExecError::ConfigError(
                "probe timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Turn a finished command into an observation
    fn interpret(&self, result: CommandResult) -> Result<Observation<ProbeOutput>, ExecError> {
        if self.absent_exit_codes.contains(&result.status) {
            debug!(status = result.status, "probe command reports resource absent");
            return Ok(Observation::absent());
        }

        if !result.success() {
            return Err(ExecError::CommandFailed {
                status: result.status,
                stderr: result.stderr_trimmed().to_string(),
            });
        }

        match &self.json_pointer {
            None => Self::parse_plain(result.stdout),
            Some(pointer) => Self::parse_json(result.stdout, pointer),
        }
    }

    fn parse_plain(stdout: String) -> Result<Observation<ProbeOutput>, ExecError> {
        let state = stdout.trim().to_string();
        if state.is_empty() {
            return Err(ExecError::InvalidOutput(
                "probe command printed nothing".to_string(),
            ));
        }

        Ok(Observation::found(
            ProbeOutput {
                state: state.clone(),
                stdout,
                json: None,
            },
            state,
        ))
    }

    fn parse_json(stdout: String, pointer: &str) -> Result<Observation<ProbeOutput>, ExecError> {
        let json: Value = serde_json::from_str(&stdout)
            .map_err(|e| ExecError::InvalidOutput(format!("stdout is not JSON: {e}")))?;

        let state = match json.pointer(pointer) {
            Some(Value::String(state)) => state.clone(),
            Some(Value::Null) => return Ok(Observation::absent()),
            Some(other) => {
                return Err(ExecError::InvalidOutput(format!(
                    "value at {pointer} is not a string: {other}"
                )));
            }
            None => {
                return Err(ExecError::InvalidOutput(format!(
                    "no value at JSON pointer {pointer}"
                )));
            }
        };

        Ok(Observation::found(
            ProbeOutput {
                state: state.clone(),
                stdout,
                json: Some(json),
            },
            state,
        ))
    }
}

#[async_trait]
impl Probe for CommandProbe {
    type Payload = ProbeOutput;

    #[instrument(skip(self), level = "debug", fields(command = %self.command))]
    async fn probe(&self) -> Result<Observation<ProbeOutput>, ProbeError> {
        let result = self.executor.run(&self.command, self.timeout).await?;
        let observation = self.interpret(result)?;

        debug!(
            state = %observation.state,
            absent = observation.is_absent(),
            "probe observed"
        );

        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Executor returning canned results and recording commands
    struct MockExecutor {
        result: CommandResult,
        commands: Mutex<Vec<String>>,
    }

    impl MockExecutor {
        fn new(status: i32, stdout: &str) -> Arc<Self> {
            Arc::new(Self {
                result: CommandResult {
                    status,
                    stdout: stdout.to_string(),
                    stderr: "simulated failure\n".to_string(),
                    duration: Duration::from_millis(1),
                },
                commands: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run(
            &self,
            cmd: &str,
            _timeout: Option<Duration>,
        ) -> Result<CommandResult, ExecError> {
            self.commands.lock().unwrap().push(cmd.to_string());
            Ok(self.result.clone())
        }

        fn executor_type(&self) -> &'static str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_plain_state() {
        let executor = MockExecutor::new(0, "  ACTIVE\n");
        let probe = CommandProbe::new(executor.clone(), "describe-cluster");

        let observation = probe.probe().await.unwrap();

        assert_eq!(observation.state, "ACTIVE");
        let payload = observation.payload.unwrap();
        assert_eq!(payload.state, "ACTIVE");
        assert_eq!(payload.stdout, "  ACTIVE\n");
        assert_eq!(*executor.commands.lock().unwrap(), vec!["describe-cluster"]);
    }

    #[tokio::test]
    async fn test_json_pointer_state() {
        let executor = MockExecutor::new(0, r#"{"Cluster": {"Status": "CREATING", "Name": "prod"}}"#);
        let probe = CommandProbe::new(executor, "describe").with_json_pointer("/Cluster/Status");

        let observation = probe.probe().await.unwrap();

        assert_eq!(observation.state, "CREATING");
        let json = observation.payload.unwrap().json.unwrap();
        assert_eq!(json["Cluster"]["Name"], "prod");
    }

    #[tokio::test]
    async fn test_json_null_is_absent() {
        let executor = MockExecutor::new(0, r#"{"Cluster": null}"#);
        let probe = CommandProbe::new(executor, "describe").with_json_pointer("/Cluster");

        assert!(probe.probe().await.unwrap().is_absent());
    }

    #[tokio::test]
    async fn test_json_errors() {
        let probe = CommandProbe::new(MockExecutor::new(0, "not json"), "describe")
            .with_json_pointer("/Status");
        let err = probe.probe().await.unwrap_err();
        assert!(err.to_string().starts_with("invalid command output: stdout is not JSON"));

        let probe = CommandProbe::new(MockExecutor::new(0, r#"{"Status": 3}"#), "describe")
            .with_json_pointer("/Status");
        let err = probe.probe().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid command output: value at /Status is not a string: 3"
        );

        let probe = CommandProbe::new(MockExecutor::new(0, "{}"), "describe")
            .with_json_pointer("/Status");
        let err = probe.probe().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid command output: no value at JSON pointer /Status"
        );
    }

    #[tokio::test]
    async fn test_absent_exit_code() {
        let probe =
            CommandProbe::new(MockExecutor::new(254, ""), "describe").with_absent_exit_code(254);

        assert!(probe.probe().await.unwrap().is_absent());
    }

    #[tokio::test]
    async fn test_failed_command_is_error() {
        let probe =
            CommandProbe::new(MockExecutor::new(1, ""), "describe").with_absent_exit_code(254);

        let err = probe.probe().await.unwrap_err();
        let exec = err.downcast_ref::<ExecError>().unwrap();

        assert!(matches!(exec, ExecError::CommandFailed { status: 1, .. }));
        assert_eq!(
            err.to_string(),
            "command execution failed: 1 - simulated failure"
        );
    }

    #[tokio::test]
    async fn test_empty_output_is_error() {
        let probe = CommandProbe::new(MockExecutor::new(0, "\n"), "describe");

        let err = probe.probe().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid command output: probe command printed nothing"
        );
    }

    #[test]
    fn test_validate() {
        let executor = MockExecutor::new(0, "");

        assert!(CommandProbe::new(executor.clone(), "true").validate().is_ok());
        assert!(CommandProbe::new(executor.clone(), "  ").validate().is_err());
        assert!(
            CommandProbe::new(executor.clone(), "true")
                .with_json_pointer("Status")
                .validate()
                .is_err()
        );
        assert!(
            CommandProbe::new(executor.clone(), "true")
                .with_absent_exit_code(0)
                .validate()
                .is_err()
        );
        assert!(
            CommandProbe::new(executor, "true")
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_local_command() {
        let probe = CommandProbe::new(Arc::new(crate::LocalExecutor::new()), "printf DELETING");

        let observation = probe.probe().await.unwrap();
        assert_eq!(observation.state, "DELETING");
    }
}
