//! Configuration loading and types
//!
//! `settle.toml` holds logging settings and named wait profiles. A profile
//! bundles the pending/target labels, timing and probe command for one kind
//! of resource so callers can write `settle wait --profile cluster-create`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};
use settle_core::WaitConfig;
use settle_exec::{CommandProbe, LocalExecutor};

/// Deadline used when neither the profile nor the command line sets one
pub const DEFAULT_TIMEOUT_SECS: u64 = 20 * 60;

/// Top-level configuration for the settle CLI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
    /// Named wait profiles
    #[serde(default)]
    pub profile: BTreeMap<String, ProfileConfig>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log line format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Wait settings for one kind of resource
///
/// Every field is optional so a profile can be overlaid with command line
/// flags; see [`ProfileConfig::merge`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    /// Transitional labels
    #[serde(default)]
    pub pending: Vec<String>,
    /// Terminal success labels; empty waits for the resource to disappear
    #[serde(default)]
    pub target: Vec<String>,
    pub timeout_secs: Option<u64>,
    pub delay_secs: Option<u64>,
    pub min_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub continuous_target_occurrence: Option<u32>,
    pub not_found_checks: Option<u32>,
    /// Status command, run through `sh -c`
    pub command: Option<String>,
    /// JSON pointer selecting the state label in the command output
    pub json_pointer: Option<String>,
    /// Exit statuses meaning "resource not found"
    #[serde(default)]
    pub absent_exit_codes: Vec<i32>,
    /// Deadline for a single run of the status command
    pub probe_timeout_secs: Option<u64>,
}

impl ProfileConfig {
    /// Overlay `other` on top of `self`; set values in `other` win
    #[must_use]
    pub fn merge(self, other: ProfileConfig) -> Self {
        fn pick_vec<T>(base: Vec<T>, over: Vec<T>) -> Vec<T> {
            if over.is_empty() { base } else { over }
        }

        Self {
            pending: pick_vec(self.pending, other.pending),
            target: pick_vec(self.target, other.target),
            timeout_secs: other.timeout_secs.or(self.timeout_secs),
            delay_secs: other.delay_secs.or(self.delay_secs),
            min_timeout_ms: other.min_timeout_ms.or(self.min_timeout_ms),
            poll_interval_ms: other.poll_interval_ms.or(self.poll_interval_ms),
            max_interval_ms: other.max_interval_ms.or(self.max_interval_ms),
            continuous_target_occurrence: other
                .continuous_target_occurrence
                .or(self.continuous_target_occurrence),
            not_found_checks: other.not_found_checks.or(self.not_found_checks),
            command: other.command.or(self.command),
            json_pointer: other.json_pointer.or(self.json_pointer),
            absent_exit_codes: pick_vec(self.absent_exit_codes, other.absent_exit_codes),
            probe_timeout_secs: other.probe_timeout_secs.or(self.probe_timeout_secs),
        }
    }

    /// Build the waiter configuration
    #[must_use]
    pub fn wait_config(&self) -> WaitConfig {
        let timeout = Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let mut config = WaitConfig::new(self.pending.iter(), self.target.iter(), timeout);

        if let Some(secs) = self.delay_secs {
            config = config.with_delay(Duration::from_secs(secs));
        }
        if let Some(ms) = self.min_timeout_ms {
            config = config.with_min_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = self.max_interval_ms {
            config = config.with_max_interval(Duration::from_millis(ms));
        }
        if let Some(count) = self.continuous_target_occurrence {
            config = config.with_continuous_target_occurrence(count);
        }
        if let Some(checks) = self.not_found_checks {
            config = config.with_not_found_checks(checks);
        }

        config
    }

    /// Build the status probe
    ///
    /// # Errors
    /// Returns error if no command is configured
    pub fn command_probe(&self) -> eyre::Result<CommandProbe> {
        let command = self
            .command
            .as_deref()
            .ok_or_else(|| eyre!("no status command given (pass it after `--` or set `command` in the profile)"))?;

        let mut probe = CommandProbe::new(Arc::new(LocalExecutor::new()), command);
        if let Some(pointer) = &self.json_pointer {
            probe = probe.with_json_pointer(pointer.clone());
        }
        for code in &self.absent_exit_codes {
            probe = probe.with_absent_exit_code(*code);
        }
        if let Some(secs) = self.probe_timeout_secs {
            probe = probe.with_timeout(Duration::from_secs(secs));
        }

        Ok(probe)
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("failed to parse {}", path.display()))
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns error if the text is not a valid configuration
    pub fn parse(content: &str) -> eyre::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from the default locations
    ///
    /// Returns the path the configuration came from, or `None` when no file
    /// was found and defaults are used.
    ///
    /// # Errors
    /// Returns error if a config file exists but cannot be loaded
    pub fn load_default() -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Ok(path) = std::env::var("SETTLE_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("settle.toml"),
            PathBuf::from("/etc/settle/settle.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("settle/settle.toml"));
        }

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }

    /// Look up a profile by name
    ///
    /// # Errors
    /// Returns error if the profile does not exist
    pub fn profile(&self, name: &str) -> eyre::Result<&ProfileConfig> {
        self.profile.get(name).ok_or_else(|| {
            let known: Vec<&str> = self.profile.keys().map(String::as_str).collect();
            eyre!("unknown profile '{name}' (known profiles: {known:?})")
        })
    }
}
