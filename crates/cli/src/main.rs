//! Stepwise CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Work a request with the agent
//! - `tools`   — Print the tool catalog offered to the model
//! - `config`  — Show default config, config path, or validate the file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise — a bounded, tool-calling ReAct agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a request
    Run {
        /// The request; prompted for on stdin when omitted
        #[arg(short, long)]
        message: Option<String>,

        /// Override the configured step budget
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Print the tool catalog as function-calling JSON
    Tools,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: Option<commands::config_cmd::ConfigAction>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Run { message, max_steps } => commands::run::run(message, max_steps).await?,
        Commands::Tools => commands::tools::run()?,
        Commands::Config { action } => commands::config_cmd::run(action.unwrap_or_default())?,
    }

    Ok(())
}
