use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod session;

use commands::{
    AssetCommand, ConfigCommand, ContributionCommand, GroupCommand, LiabilityCommand,
    SnapshotCommand, StatusCommand, WatchCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "wealth")]
#[command(version)]
#[command(about = "Family net-worth tracker with local-first sync", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show net worth, goals and sync state
    Status(StatusCommand),

    /// Share data with a family group
    Group(GroupCommand),

    /// Manage assets
    Asset(AssetCommand),

    /// Manage liabilities
    Liability(LiabilityCommand),

    /// Show or set the monthly contribution
    Contribution(ContributionCommand),

    /// Record a net-worth snapshot
    Snapshot(SnapshotCommand),

    /// Follow sync activity until interrupted
    Watch(WatchCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with command output
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env("WEALTH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(execute_command(&cli.command, &config, cli_config_path))
}

async fn execute_command(
    command: &Option<Commands>,
    config: &Config,
    cli_config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Some(Commands::Status(cmd)) => cmd.run(config).await,
        Some(Commands::Group(cmd)) => cmd.run(config).await,
        Some(Commands::Asset(cmd)) => cmd.run(config).await,
        Some(Commands::Liability(cmd)) => cmd.run(config).await,
        Some(Commands::Contribution(cmd)) => cmd.run(config).await,
        Some(Commands::Snapshot(cmd)) => cmd.run(config).await,
        Some(Commands::Watch(cmd)) => cmd.run(config).await,
        Some(Commands::Config(cmd)) => cmd.run(config, cli_config_path),
        None => {
            println!("Use --help to see available commands");
            Ok(())
        }
    }
}
