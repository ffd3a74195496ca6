use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use tracing::info;

use cockpit_core::trigger::ManualTrigger;
use cockpit_types::{Account, ScheduleConfig, TriggerRecord};

use crate::cli::{AccountCommands, ScheduleCommands};
use crate::state::AppState;
use crate::{router, scheduler, server_utils};

pub async fn serve(data_dir: PathBuf, port: u16, check_interval: u64) -> Result<()> {
    info!("🚀 Antigravity Cockpit starting on port {}...", port);

    let state = AppState::open(data_dir).await?;
    state.controller().start().await?;
    info!("✅ Auto-trigger controller started ({:?})", state.controller().schedule().mode());

    let checker = scheduler::start_quota_check(state.clone(), Duration::from_secs(check_interval));
    let app = router::build_router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🌐 Server listening on http://{}", addr);
    info!("🔌 API available at http://localhost:{}/api/", port);

    axum::serve(listener, app).with_graceful_shutdown(server_utils::shutdown_signal()).await?;

    checker.abort();
    state.controller().stop();
    info!("👋 Cockpit stopped");
    Ok(())
}

pub async fn handle_status(data_dir: PathBuf) -> Result<()> {
    let state = AppState::open(data_dir).await?;
    let snapshot = state.controller().snapshot().await;

    println!("{}", "Antigravity Cockpit Status".cyan().bold());
    println!("  Schedule: {}", snapshot.description);
    if let Some(at) = snapshot.next_fallback_at.and_then(chrono::DateTime::from_timestamp_millis) {
        println!("  Next fallback: {}", at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M"));
    }
    println!(
        "  Accounts: {} total, active: {}",
        snapshot.accounts.len(),
        snapshot.active_account.as_deref().unwrap_or("-")
    );
    match snapshot.history.first() {
        Some(last) => println!("  Last trigger: {} ({})", format_time(last.timestamp), outcome(last)),
        None => println!("  Last trigger: -"),
    }
    println!("  Data dir: {}", state.data_dir().display());
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

pub async fn handle_trigger(
    data_dir: PathBuf,
    models: Vec<String>,
    accounts: Vec<String>,
    prompt: Option<String>,
) -> Result<()> {
    let state = AppState::open(data_dir).await?;
    let request = ManualTrigger {
        models,
        prompt,
        accounts: (!accounts.is_empty()).then_some(accounts),
        max_output_tokens: None,
    };

    println!("{}", "Sending keep-alive...".cyan());
    let records = state.controller().trigger_now(request).await?;
    for record in &records {
        let email = record.account_email.as_deref().unwrap_or("-");
        if record.success {
            println!("{} {} ({}ms)", "✓".green(), email.green(), record.duration_ms);
        } else {
            println!("{} {} ({}ms)", "✗".red(), email.red(), record.duration_ms);
        }
        for line in record.message.lines() {
            println!("    {}", line);
        }
    }
    Ok(())
}

pub async fn handle_history(data_dir: PathBuf, json: bool, limit: usize) -> Result<()> {
    let state = AppState::open(data_dir).await?;
    let records = state.controller().history(limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("{}", "No triggers yet.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Time", "Source", "Account", "Result", "Duration", "Models"]);
    for record in &records {
        table.add_row(vec![
            Cell::new(format_time(record.timestamp)),
            Cell::new(record.trigger_source.to_string()),
            Cell::new(record.account_email.as_deref().unwrap_or("-")),
            if record.success {
                Cell::new("OK").fg(Color::Green)
            } else {
                Cell::new("Failed").fg(Color::Red)
            },
            Cell::new(format!("{}ms", record.duration_ms)),
            Cell::new(&record.prompt),
        ]);
    }
    println!("{table}");
    println!("\n{} records", records.len());
    Ok(())
}

pub async fn handle_schedule_command(data_dir: PathBuf, cmd: ScheduleCommands) -> Result<()> {
    let state = AppState::open(data_dir).await?;
    let controller = state.controller();

    match cmd {
        ScheduleCommands::Show { json } => {
            let snapshot = controller.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.schedule)?);
            } else {
                println!("{}", "Auto-trigger schedule".cyan().bold());
                println!("  Mode: {:?}", snapshot.mode);
                println!("  {}", snapshot.description);
                println!("  Models: {}", join_or_dash(&snapshot.schedule.selected_models));
            }
        },
        ScheduleCommands::Set { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let config: ScheduleConfig =
                serde_json::from_str(&content).context("Failed to parse schedule JSON")?;
            controller.save_schedule(config).await?;
            println!("{} Schedule saved: {}", "✓".green(), controller.snapshot().await.description);
        },
        ScheduleCommands::Disable => {
            let config = ScheduleConfig { enabled: false, ..controller.schedule() };
            controller.save_schedule(config).await?;
            println!("{} Auto-trigger disabled", "✓".green());
        },
    }
    Ok(())
}

pub async fn handle_account_command(data_dir: PathBuf, cmd: AccountCommands) -> Result<()> {
    let state = AppState::open(data_dir).await?;
    let controller = state.controller();

    match cmd {
        AccountCommands::List { json } => {
            let snapshot = controller.snapshot().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot.accounts)?);
                return Ok(());
            }
            if snapshot.accounts.is_empty() {
                println!("{}", "No accounts found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Email", "Status"]);
            for email in &snapshot.accounts {
                let status = if snapshot.active_account.as_deref() == Some(email.as_str()) {
                    Cell::new("Active").fg(Color::Green)
                } else {
                    Cell::new("-")
                };
                table.add_row(vec![Cell::new(email), status]);
            }
            println!("{table}");
            println!("\n{} accounts total", snapshot.accounts.len());
        },
        AccountCommands::Switch { email } => {
            controller.switch_account(&email).await?;
            println!("{} Active account: {}", "✓".green(), email.green());
        },
        AccountCommands::Remove { email } => {
            controller.revoke_account(&email).await?;
            println!("{} Account removed: {}", "✓".green(), email.green());
            if !controller.schedule().enabled {
                println!("{}", "Auto-trigger is disabled.".yellow());
            }
        },
        AccountCommands::Import { file } => {
            let content = std::fs::read_to_string(&file).context("Failed to read file")?;
            let account: Account =
                serde_json::from_str(&content).context("Failed to parse account JSON")?;
            let email = account.email.clone();
            controller.import_account(account).await?;
            println!("{} Account imported: {}", "✓".green(), email.green());
        },
    }
    Ok(())
}

fn format_time(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|t| t.with_timezone(&chrono::Local).format("%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn outcome(record: &TriggerRecord) -> &'static str {
    if record.success {
        "ok"
    } else {
        "failed"
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
