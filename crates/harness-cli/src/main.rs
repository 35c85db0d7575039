mod cmd;
mod config_path;
mod console;
mod output;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, serve::ServeArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gameapi-harness",
    about = "Operator harness for Game API integrations: stand in for the agent, inspect actions, answer forced actions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: gameapi-harness.yaml in this or a parent directory)
    #[arg(long, global = true, env = "HARNESS_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept a game connection and start the operator console
    Serve(ServeArgs),

    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let explicit = cli.config.as_deref();

    let result = match cli.command {
        Commands::Serve(args) => config_path::load(explicit)
            .and_then(|(config, _)| cmd::serve::run(config, args)),
        Commands::Config { subcommand } => cmd::config::run(explicit, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
