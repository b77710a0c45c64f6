//! Command executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Runs shell commands on behalf of a probe
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run a command to completion
    ///
    /// With `Some(timeout)` the command is killed and [`ExecError::Timeout`]
    /// returned once the deadline passes.
    async fn run(&self, cmd: &str, timeout: Option<Duration>)
    -> Result<CommandResult, ExecError>;

    /// Short name used in logs
    fn executor_type(&self) -> &'static str;
}
