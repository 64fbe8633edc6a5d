mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "idlewatch",
    about = "Find student project teams that stopped pushing work, warn them, and close them",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file
    #[arg(
        long,
        short = 'c',
        global = true,
        env = "IDLEWATCH_CONFIG",
        default_value = idlewatch_core::config::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log request-level detail
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess every eligible team and act on the result
    Run {
        /// Classify and report only: no team is closed and no mail is sent
        #[arg(long)]
        dry_run: bool,
    },

    /// Probe and classify a single team without acting on it
    Check {
        /// Directory id of the team
        team_id: u64,
    },

    /// Inspect the config file
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        match &cli.command {
            Commands::Run { .. } => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run { dry_run } => cmd::run::run(&cli.config, dry_run, cli.json).await,
        Commands::Check { team_id } => cmd::check::run(&cli.config, team_id, cli.json).await,
        Commands::Config { subcommand } => cmd::config::run(&cli.config, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
