use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_PORT: &str = "8046";
pub const DEFAULT_CHECK_INTERVAL_SECS: &str = "120";

#[derive(Parser)]
#[command(
    name = "cockpit",
    about = "Antigravity Cockpit - quota keep-alive scheduler",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "COCKPIT_PORT", default_value = DEFAULT_PORT)]
    pub port: u16,

    #[arg(long, env = "COCKPIT_CHECK_INTERVAL", default_value = DEFAULT_CHECK_INTERVAL_SECS)]
    pub check_interval: u64,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the daemon (default if no command specified)")]
    Serve {
        #[arg(short, long, env = "COCKPIT_PORT", default_value = DEFAULT_PORT)]
        port: u16,

        #[arg(
            long,
            env = "COCKPIT_CHECK_INTERVAL",
            default_value = DEFAULT_CHECK_INTERVAL_SECS,
            help = "Seconds between quota reset checks"
        )]
        check_interval: u64,
    },

    #[command(about = "Show schedule, accounts and the last trigger")]
    Status,

    #[command(about = "Send a keep-alive right now")]
    Trigger {
        #[arg(short, long = "model", required = true, help = "Model id (repeatable)")]
        models: Vec<String>,

        #[arg(short, long = "account", help = "Account email (repeatable, default: active)")]
        accounts: Vec<String>,

        #[arg(long, help = "Prompt text (default: \"hi\")")]
        prompt: Option<String>,
    },

    #[command(about = "Show trigger history")]
    History {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,

        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },

    #[command(subcommand, about = "View and change the auto-trigger schedule")]
    Schedule(ScheduleCommands),

    #[command(subcommand, about = "Manage Google accounts")]
    Account(AccountCommands),
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    #[command(about = "Show the current schedule")]
    Show {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Replace the schedule from a JSON file")]
    Set {
        #[arg(help = "Path to schedule JSON file")]
        file: PathBuf,
    },

    #[command(about = "Disable automatic triggering")]
    Disable,
}

#[derive(Subcommand)]
pub enum AccountCommands {
    #[command(about = "List all accounts")]
    List {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Make an account the active one")]
    Switch {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Remove an account")]
    Remove {
        #[arg(help = "Account email")]
        email: String,
    },

    #[command(about = "Import an account from a JSON file")]
    Import {
        #[arg(help = "Path to account JSON file")]
        file: PathBuf,
    },
}
