mod commands;
mod render;
mod utils;

use anyhow::Result;
use calsync_core::config::CalsyncConfig;
use clap::{Parser, Subcommand};

use crate::commands::auth::Side;

#[derive(Parser)]
#[command(name = "calsync")]
#[command(about = "Copy events from one calendar provider to another without duplicates")]
struct Cli {
    /// Show progress logs and list every event instead of counts
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines (stderr)
    #[arg(long, global = true)]
    json_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Copy source events into the destination
    Sync {
        /// Sync events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Sync events until this date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Also copy destination events back to the source
        #[arg(long)]
        bidirectional: bool,

        /// Print the cycle results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show what a sync would do, without writing anything
    Status {
        /// Show events from this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Show events until this date, inclusive (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Also preview copying destination events back to the source
        #[arg(long)]
        bidirectional: bool,
    },
    /// Sign in to the source or destination provider ahead of a sync
    Auth {
        #[arg(value_enum)]
        side: Side,
    },
    /// Show where calsync keeps its config and state
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::logging::init(cli.verbose, cli.json_log);

    match cli.command {
        Commands::Sync {
            from,
            to,
            bidirectional,
            json,
        } => {
            let config = CalsyncConfig::load()?;
            require_endpoints(&config)?;
            let window = config.window(from.as_deref(), to.as_deref())?;
            let bidirectional = bidirectional || config.bidirectional;
            commands::sync::run(&config, window, bidirectional, json, cli.verbose).await
        }
        Commands::Status {
            from,
            to,
            bidirectional,
        } => {
            let config = CalsyncConfig::load()?;
            require_endpoints(&config)?;
            let window = config.window(from.as_deref(), to.as_deref())?;
            let bidirectional = bidirectional || config.bidirectional;
            commands::status::run(&config, window, bidirectional, cli.verbose).await
        }
        Commands::Auth { side } => {
            let config = CalsyncConfig::load()?;
            commands::auth::run(&config, side).await
        }
        Commands::Config => commands::config::run(),
    }
}

fn require_endpoints(config: &CalsyncConfig) -> Result<()> {
    if config.source.is_none() || config.destination.is_none() {
        let config_path = CalsyncConfig::config_path()?;
        anyhow::bail!(
            "No calendars configured.\n\n\
            Add a [source] and a [destination] table to:\n  \
            {}\n\n\
            Example:\n  \
            [source]\n  \
            provider = \"google\"\n  \
            account = \"me@gmail.com\"",
            config_path.display()
        );
    }

    Ok(())
}
