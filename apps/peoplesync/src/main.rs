//! peoplesync - synchronize people between a source and a destination
//!
//! Each run reads a YAML configuration, computes a full change set per
//! enabled sync set and applies it, then e-mails one alert for everything
//! that needs a human.

use clap::{Args, Parser, Subcommand};
use peoplesync::commands;
use peoplesync::config::{AppConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use peoplesync::error::CliResult;
use peoplesync::logging::init_logging;
use peoplesync_engine::sync::Verbosity;
use std::path::PathBuf;

/// peoplesync - people synchronization
#[derive(Parser, Debug)]
#[command(name = "peoplesync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Path to the configuration file
    #[arg(short, long, global = true, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log verbosity (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true)]
    verbosity: Option<Verbosity>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every enabled sync set once
    Run(commands::run::RunArgs),

    /// Check the configuration without contacting any system
    Validate(commands::validate::ValidateArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let mut config = AppConfig::load(&cli.global.config)?;
    let dry_run = matches!(&cli.command, Commands::Run(args) if args.dry_run);
    config.apply_cli_overrides(dry_run, cli.global.verbosity);

    init_logging(config.logging.format, config.sync.runtime.verbosity)?;
    tracing::info!(config = %cli.global.config.display(), "Configuration loaded");

    match cli.command {
        Commands::Run(_) => commands::run::execute(&config).await,
        Commands::Validate(_) => commands::validate::execute(&config),
    }
}
