//! settle CLI
//!
//! Waits for asynchronously provisioned resources to converge by polling a
//! status command

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod wait;

use config::{Config, LogFormat};
use wait::WaitArgs;

#[derive(Parser)]
#[command(name = "settle", version)]
#[command(about = "Wait for cloud resources to reach a stable state", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $SETTLE_CONFIG, ./settle.toml, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level, overrides the configuration file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format, overrides the configuration file
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a status command until the resource converges
    Wait(WaitArgs),

    /// List configured profiles
    #[command(name = "profiles")]
    Profiles,
}

/// Install the tracing subscriber, logging to stderr
fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn list_profiles(config: &Config) {
    if config.profile.is_empty() {
        println!("no profiles configured");
        return;
    }

    for (name, profile) in &config.profile {
        let target = if profile.target.is_empty() {
            "<absent>".to_string()
        } else {
            profile.target.join(",")
        };
        println!("{name}: [{}] -> [{target}]", profile.pending.join(","));
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Loaded before logging is up; the outcome is logged below
    let (config, source) = match &cli.config {
        Some(path) => (Config::load(path)?, Some(path.clone())),
        None => Config::load_default()?,
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    init_tracing(level, cli.log_format.unwrap_or(config.log.format));

    match &source {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => debug!("no config file found, using defaults"),
    }

    match cli.command {
        Commands::Wait(args) => wait::run(args, &config).await,
        Commands::Profiles => {
            list_profiles(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
