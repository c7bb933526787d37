//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`   : Run one task to completion (or cancellation) in a workspace
//! - `tools` : List the built-in tools and their parameter schemas
//! - `config`: Print a starter configuration file

use clap::{Parser, Subcommand};
use std::process::ExitCode;

mod commands;
mod prompt;
mod terminal;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: an autonomous tool-using agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task; reads it from stdin when no message is given
    Run(commands::run::RunArgs),

    /// List the built-in tools
    Tools {
        /// Print full parameter schemas
        #[arg(long)]
        schemas: bool,
    },

    /// Print a default configuration file
    Config {
        /// Print the config file location instead
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.verbose).await,
        Commands::Tools { schemas } => {
            commands::tools::run(schemas)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { path } => {
            commands::config_cmd::run(path);
            Ok(ExitCode::SUCCESS)
        }
    }
}

