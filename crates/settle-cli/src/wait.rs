//! `settle wait`: poll a status command until the resource converges

use std::process::ExitCode;

use clap::Args;
use color_eyre::Result;
use serde::Serialize;
use settle_core::{CancellationToken, WaitErrorKind, Waiter};
use settle_exec::ProbeOutput;
use tracing::{error, info, warn};

use crate::config::{Config, ProfileConfig};

pub const EXIT_TIMEOUT: u8 = 2;
pub const EXIT_UNEXPECTED_STATE: u8 = 3;
pub const EXIT_UNEXPECTED_ABSENCE: u8 = 4;
pub const EXIT_PROBE_FAILED: u8 = 5;
pub const EXIT_INVALID_CONFIG: u8 = 64;
pub const EXIT_CANCELLED: u8 = 130;

/// Arguments for `settle wait`
#[derive(Args, Debug, Default)]
pub struct WaitArgs {
    /// Profile from the configuration file to start from
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Transitional state (repeatable, comma separated)
    #[arg(long, value_delimiter = ',')]
    pub pending: Vec<String>,

    /// Terminal success state (repeatable, comma separated); none waits for absence
    #[arg(long, value_delimiter = ',')]
    pub target: Vec<String>,

    /// Overall deadline
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Wait before the first probe
    #[arg(long, value_name = "SECS")]
    pub delay: Option<u64>,

    /// Minimum time between probes
    #[arg(long, value_name = "MS")]
    pub min_timeout: Option<u64>,

    /// Fixed time between probes, disables backoff
    #[arg(long, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Maximum time between probes
    #[arg(long, value_name = "MS")]
    pub max_interval: Option<u64>,

    /// Consecutive target observations required
    #[arg(long, value_name = "N")]
    pub occurrences: Option<u32>,

    /// Consecutive "not found" results tolerated
    #[arg(long, value_name = "N")]
    pub not_found_checks: Option<u32>,

    /// JSON pointer to the state field in the command output
    #[arg(long, value_name = "PTR")]
    pub json_pointer: Option<String>,

    /// Exit status meaning "resource not found" (repeatable)
    #[arg(long = "absent-exit-code", value_name = "CODE")]
    pub absent_exit_codes: Vec<i32>,

    /// Deadline for a single run of the status command
    #[arg(long, value_name = "SECS")]
    pub probe_timeout: Option<u64>,

    /// How to print the final payload
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Status command, run through `sh -c`
    ///
    /// A single argument is used as the shell script as is; several arguments
    /// are quoted so each reaches the command unchanged.
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Payload output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Raw stdout of the last probe
    #[default]
    Text,
    /// JSON report with outcome, state and payload
    Json,
}

impl WaitArgs {
    /// Command line settings as a profile overlay
    fn overlay(&self) -> ProfileConfig {
        ProfileConfig {
            pending: self.pending.clone(),
            target: self.target.clone(),
            timeout_secs: self.timeout,
            delay_secs: self.delay,
            min_timeout_ms: self.min_timeout,
            poll_interval_ms: self.poll_interval,
            max_interval_ms: self.max_interval,
            continuous_target_occurrence: self.occurrences,
            not_found_checks: self.not_found_checks,
            command: self.shell_command(),
            json_pointer: self.json_pointer.clone(),
            absent_exit_codes: self.absent_exit_codes.clone(),
            probe_timeout_secs: self.probe_timeout,
        }
    }

    /// Status command as a script for `sh -c`
    fn shell_command(&self) -> Option<String> {
        match self.command.as_slice() {
            [] => None,
            [script] => Some(script.clone()),
            words => Some(shell_words::join(words)),
        }
    }

    /// Effective profile: the named profile with command line overrides
    ///
    /// # Errors
    /// Returns error if the named profile does not exist
    pub fn resolve(&self, config: &Config) -> Result<ProfileConfig> {
        let base = match &self.profile {
            Some(name) => config.profile(name)?.clone(),
            None => ProfileConfig::default(),
        };
        Ok(base.merge(self.overlay()))
    }
}

/// Machine readable result of a wait
#[derive(Debug, Serialize)]
struct Report<'a> {
    outcome: &'a str,
    state: Option<&'a str>,
    error: Option<String>,
    payload: Option<&'a ProbeOutput>,
}

/// Exit status for a failed wait
#[must_use]
pub fn exit_code(kind: WaitErrorKind) -> u8 {
    match kind {
        WaitErrorKind::Timeout => EXIT_TIMEOUT,
        WaitErrorKind::UnexpectedState => EXIT_UNEXPECTED_STATE,
        WaitErrorKind::UnexpectedAbsence => EXIT_UNEXPECTED_ABSENCE,
        WaitErrorKind::Probe => EXIT_PROBE_FAILED,
        WaitErrorKind::InvalidConfig => EXIT_INVALID_CONFIG,
        WaitErrorKind::Cancelled => EXIT_CANCELLED,
    }
}

/// Run `settle wait`
///
/// # Errors
/// Returns error if the profile cannot be resolved or output cannot be written
pub async fn run(args: WaitArgs, config: &Config) -> Result<ExitCode> {
    let profile = args.resolve(config)?;
    let probe = profile.command_probe()?;
    if let Err(e) = probe.validate() {
        error!(error = %e, "invalid probe settings");
        eprintln!("error: {e}");
        return Ok(ExitCode::from(EXIT_INVALID_CONFIG));
    }

    let wait_config = profile.wait_config();
    info!(
        command = %probe.command(),
        pending = ?profile.pending,
        target = ?profile.target,
        timeout = ?wait_config.timeout,
        "waiting for resource"
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling wait");
                cancel.cancel();
            }
        })
    };

    let result = Waiter::new(wait_config)
        .with_cancellation(cancel)
        .wait(&probe)
        .await;
    interrupt.abort();

    match result {
        Ok(payload) => {
            info!(absent = payload.is_none(), "resource converged");
            let state = payload.as_ref().map(|p| p.state.as_str());
            print_result(args.output, "converged", state, None, payload.as_ref())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            let kind = err.kind();
            error!(kind = %kind, error = %err, "wait failed");
            if args.output == OutputFormat::Text {
                eprintln!("error: {err}");
            }
            print_result(
                args.output,
                &kind.to_string(),
                err.last_state(),
                Some(err.to_string()),
                err.payload(),
            )?;
            Ok(ExitCode::from(exit_code(kind)))
        }
    }
}

fn print_result(
    format: OutputFormat,
    outcome: &str,
    state: Option<&str>,
    error: Option<String>,
    payload: Option<&ProbeOutput>,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if let Some(payload) = payload {
                println!("{}", payload.stdout.trim_end());
            }
        }
        OutputFormat::Json => {
            let report = Report {
                outcome,
                state,
                error,
                payload,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            WaitErrorKind::Timeout,
            WaitErrorKind::UnexpectedState,
            WaitErrorKind::UnexpectedAbsence,
            WaitErrorKind::Probe,
            WaitErrorKind::InvalidConfig,
            WaitErrorKind::Cancelled,
        ];
        let mut codes: Vec<u8> = kinds.iter().map(|k| exit_code(*k)).collect();
        codes.sort_unstable();
        codes.dedup();

        assert_eq!(codes.len(), kinds.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_overlay_on_profile() {
        let config = Config::parse(
            r#"
[profile.db]
pending = ["creating", "backing-up"]
target = ["available"]
timeout_secs = 3600
command = "describe-db"
"#,
        )
        .unwrap();

        let args = WaitArgs {
            profile: Some("db".to_string()),
            timeout: Some(120),
            command: vec!["describe-db".to_string(), "--id".to_string(), "prod".to_string()],
            ..WaitArgs::default()
        };
        let profile = args.resolve(&config).unwrap();

        assert_eq!(profile.timeout_secs, Some(120));
        assert_eq!(profile.target, vec!["available"]);
        assert_eq!(profile.command.as_deref(), Some("describe-db --id prod"));
    }

    #[test]
    fn test_command_words_keep_spaces() {
        let args = WaitArgs {
            command: vec!["printf".to_string(), "%s".to_string(), "IN SERVICE".to_string()],
            ..WaitArgs::default()
        };
        let script = args.shell_command().unwrap();

        assert_eq!(shell_words::split(&script).unwrap(), args.command);
    }

    #[test]
    fn test_single_command_is_script() {
        let args = WaitArgs {
            command: vec!["describe | jq -r .status".to_string()],
            ..WaitArgs::default()
        };

        assert_eq!(args.shell_command().as_deref(), Some("describe | jq -r .status"));
    }

    #[test]
    fn test_without_profile() {
        let args = WaitArgs {
            pending: vec!["DELETING".to_string()],
            command: vec!["true".to_string()],
            ..WaitArgs::default()
        };
        let profile = args.resolve(&Config::default()).unwrap();

        assert!(profile.wait_config().waits_for_absence());
    }

    #[tokio::test]
    async fn test_run_converges() {
        let args = WaitArgs {
            pending: vec!["CREATING".to_string()],
            target: vec!["ACTIVE".to_string()],
            timeout: Some(5),
            command: vec!["echo".to_string(), "ACTIVE".to_string()],
            ..WaitArgs::default()
        };

        let code = run(args, &Config::default()).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_run_state_with_space() {
        let args = WaitArgs {
            pending: vec!["OUT OF SERVICE".to_string()],
            target: vec!["IN SERVICE".to_string()],
            timeout: Some(5),
            command: vec!["printf".to_string(), "%s".to_string(), "IN SERVICE".to_string()],
            ..WaitArgs::default()
        };

        let code = run(args, &Config::default()).await.unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
    }

    #[tokio::test]
    async fn test_run_unexpected_state() {
        let args = WaitArgs {
            pending: vec!["CREATING".to_string()],
            target: vec!["ACTIVE".to_string()],
            timeout: Some(5),
            command: vec!["echo".to_string(), "FAILED".to_string()],
            ..WaitArgs::default()
        };

        let code = run(args, &Config::default()).await.unwrap();
        assert_eq!(code, ExitCode::from(EXIT_UNEXPECTED_STATE));
    }

    #[tokio::test]
    async fn test_run_invalid_probe() {
        let args = WaitArgs {
            target: vec!["ACTIVE".to_string()],
            json_pointer: Some("status".to_string()),
            command: vec!["true".to_string()],
            ..WaitArgs::default()
        };

        let code = run(args, &Config::default()).await.unwrap();
        assert_eq!(code, ExitCode::from(EXIT_INVALID_CONFIG));
    }
}
