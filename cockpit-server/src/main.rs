//! Antigravity Cockpit Server - Headless Daemon
//!
//! Keeps Antigravity model quotas warm without the IDE:
//! - Runs the auto-trigger controller (reset detection or calendar schedule)
//! - Polls quota on a fixed interval while reset detection is enabled
//! - Provides a REST API for CLI and UI control on /api/*
//!
//! Access via: http://localhost:8046

use anyhow::Result;
use clap::Parser;

mod api;
mod cli;
mod commands;
mod logging;
mod router;
mod scheduler;
mod server_utils;
mod state;

#[cfg(test)]
mod test_helpers;

use cli::{Cli, Commands};
use cockpit_core::modules::paths;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = paths::get_data_dir()
        .map_err(|e| anyhow::anyhow!("Failed to get data directory: {}", e))?;
    let _log_guard = logging::init(&data_dir, &cli.log_level);

    let command =
        cli.command.unwrap_or(Commands::Serve { port: cli.port, check_interval: cli.check_interval });

    match command {
        Commands::Serve { port, check_interval } => {
            commands::serve(data_dir, port, check_interval).await
        },
        Commands::Status => commands::handle_status(data_dir).await,
        Commands::Trigger { models, accounts, prompt } => {
            commands::handle_trigger(data_dir, models, accounts, prompt).await
        },
        Commands::History { json, limit } => commands::handle_history(data_dir, json, limit).await,
        Commands::Schedule(cmd) => commands::handle_schedule_command(data_dir, cmd).await,
        Commands::Account(cmd) => commands::handle_account_command(data_dir, cmd).await,
    }
}
