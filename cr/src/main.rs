//! Courier - multi-account message dispatch
//!
//! CLI entry point for broadcast, direct, join, and account workflows.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{info, warn};

use courier::cli::{Cli, Command, OutputFormat};
use courier::config::{Config, TransportMode};
use courier::dispatch::{DispatchEngine, JobHandle};
use courier::job::{DirectParams, JobParams, TaskState};
use courier::registry::{Account, connect_all};
use courier::status::{StatusBus, StatusEvent, StatusTable};
use wireline::{Connector, GroupTarget, JoinLink, MemoryConnector, Target};

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("courier")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("courier.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    match cli.command {
        Command::Broadcast {
            message,
            targets,
            rounds,
            round_delay,
            account_stagger,
        } => {
            let params = JobParams {
                message,
                rounds,
                round_delay_secs: round_delay,
                account_stagger_secs: account_stagger,
            };
            cmd_broadcast(&config, params, &targets).await
        }
        Command::Direct {
            message,
            users,
            rounds,
            round_delay,
            stagger,
        } => {
            let params = DirectParams {
                message,
                rounds,
                round_delay_secs: round_delay,
                target_stagger_secs: stagger,
            };
            cmd_direct(&config, params, &users).await
        }
        Command::Join { links } => cmd_join(&config, &links).await,
        Command::Accounts { format } => cmd_accounts(&config, format).await,
    }
}

/// Build the connector selected by the config
fn make_connector(config: &Config) -> Box<dyn Connector> {
    match config.transport.mode {
        TransportMode::DryRun => {
            info!("dry-run transport: deliveries land in the log only");
            Box::new(MemoryConnector::new())
        }
    }
}

/// Connect all sessions and hand back the accounts
async fn connect_accounts(config: &Config, bus: &StatusBus) -> Result<Vec<Account>> {
    let connector = make_connector(config);
    let accounts = connect_all(&config.sessions.dir, connector.as_ref(), bus).await?;
    if accounts.is_empty() {
        eyre::bail!(
            "No connected accounts. Put session files under {} and retry.",
            config.sessions.dir.display()
        );
    }
    println!("Connected {} account(s)", accounts.len());
    Ok(accounts)
}

/// Print progress events as plain lines
fn spawn_status_printer(bus: &StatusBus) {
    use tokio::sync::broadcast::error::RecvError;

    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            let session = event.session().to_string();
            let line = match &event {
                StatusEvent::Connected { phone, .. } => format!("connected ({})", phone),
                StatusEvent::ConnectFailed { reason, .. } => format!("connect failed: {}", reason),
                StatusEvent::Sending { round, index, total, .. } => {
                    format!("sending {}/{} (round {})", index, total, round)
                }
                StatusEvent::Sent { round, index, total, .. } => {
                    format!("sent {}/{} (round {})", index, total, round)
                }
                StatusEvent::Skipped { reason, .. } => format!("skipped: {}", reason),
                StatusEvent::RateLimited { wait_secs, .. } => {
                    format!("rate limited, waiting {}s", wait_secs)
                }
                StatusEvent::Failed { reason, .. } => format!("failed: {}", reason),
                StatusEvent::Aborted { reason, .. } => format!("account aborted: {}", reason),
                StatusEvent::Completed { .. } => "completed".to_string(),
                StatusEvent::Cancelled { .. } => "cancelled".to_string(),
                _ => continue,
            };
            println!("  [{}] {}", session, line);
        }
    });
}

/// Stop the job on Ctrl+C, then await all tasks
async fn run_to_completion(mut handle: JobHandle) -> Vec<courier::AccountResult> {
    let token = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping job");
            println!("\nStopping... letting in-flight sends finish");
            token.cancel();
        }
    });

    handle.join().await
}

fn print_summary(results: &[courier::AccountResult]) {
    println!();
    println!("Job finished:");
    for result in results {
        let state = match result.state {
            TaskState::Completed => format!("{}", "completed".green()),
            TaskState::Cancelled => format!("{}", "cancelled".yellow()),
            _ => format!("{}", result.state.to_string().red()),
        };
        let mut line = format!(
            "  {:<12} {:<10} sent {:>3}  skipped {:>3}  failed {:>3}",
            result.session, state, result.sent, result.skipped, result.failed
        );
        if let Some(reason) = &result.aborted {
            line.push_str(&format!("  (aborted: {})", reason));
        }
        if let Some(error) = &result.error {
            line.push_str(&format!("  (error: {})", error));
        }
        println!("{}", line);
    }
}

/// Broadcast to each account's own group list
async fn cmd_broadcast(config: &Config, params: JobParams, targets_file: &Path) -> Result<()> {
    let target_map = load_group_targets(targets_file)?;

    let bus = Arc::new(StatusBus::with_default_capacity());
    spawn_status_printer(&bus);
    let _table = StatusTable::attach(&bus);

    let mut accounts = connect_accounts(config, &bus).await?;
    for account in &mut accounts {
        if let Some(groups) = target_map.get(&account.session) {
            account.targets = groups.iter().cloned().map(Target::Group).collect();
        }
    }

    let engine = DispatchEngine::from_config(config, bus);
    let handle = engine.start_broadcast(params, &accounts)?;
    println!("Job {} started", handle.id);

    let results = run_to_completion(handle).await;
    print_summary(&results);
    Ok(())
}

/// Message each user exactly once per round, round-robin across accounts
async fn cmd_direct(config: &Config, params: DirectParams, users_file: &Path) -> Result<()> {
    let users = load_lines(users_file)?;
    if users.is_empty() {
        eyre::bail!("No user targets in {}", users_file.display());
    }
    let targets: Vec<Target> = users.into_iter().map(Target::user).collect();

    let bus = Arc::new(StatusBus::with_default_capacity());
    spawn_status_printer(&bus);

    let accounts = connect_accounts(config, &bus).await?;
    println!("Messaging {} user(s) across {} account(s)", targets.len(), accounts.len());

    let engine = DispatchEngine::from_config(config, bus);
    let handle = engine.start_direct(params, &accounts, targets)?;
    println!("Job {} started", handle.id);

    let results = run_to_completion(handle).await;
    print_summary(&results);
    Ok(())
}

/// Join every account into the linked chats
async fn cmd_join(config: &Config, links_file: &Path) -> Result<()> {
    let links: Vec<JoinLink> = load_lines(links_file)?
        .iter()
        .filter_map(|line| JoinLink::parse(line))
        .collect();
    if links.is_empty() {
        eyre::bail!("No join links in {}", links_file.display());
    }

    let bus = Arc::new(StatusBus::with_default_capacity());
    spawn_status_printer(&bus);

    let accounts = connect_accounts(config, &bus).await?;
    println!("Joining {} chat(s) with {} account(s)", links.len(), accounts.len());

    let engine = DispatchEngine::from_config(config, bus);
    let cancel = courier::CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nStopping join run...");
            token.cancel();
        }
    });

    let summary = engine.run_join(&links, &accounts, &cancel).await;

    println!();
    println!(
        "Join finished: {} joined, {} pending approval, {} failed",
        summary.joined.to_string().green(),
        summary.pending,
        summary.failed
    );
    for session in &summary.frozen_accounts {
        println!("  {} {}", "frozen:".red(), session);
    }
    Ok(())
}

/// Scan, connect, and report account status
async fn cmd_accounts(config: &Config, format: OutputFormat) -> Result<()> {
    let bus = StatusBus::with_default_capacity();
    let connector = make_connector(config);
    let accounts = connect_all(&config.sessions.dir, connector.as_ref(), &bus).await?;

    match format {
        OutputFormat::Json => {
            let rows: Vec<serde_json::Value> = accounts
                .iter()
                .map(|a| {
                    serde_json::json!({
                        "ordinal": a.ordinal,
                        "session": a.session,
                        "phone": a.phone,
                        "connected": a.is_connected(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        OutputFormat::Text => {
            if accounts.is_empty() {
                println!("No connected accounts under {}", config.sessions.dir.display());
                return Ok(());
            }
            println!("{:<4} {:<16} {:<16} {}", "#", "session", "phone", "status");
            for a in &accounts {
                let status = if a.is_connected() {
                    format!("{}", "connected".green())
                } else {
                    format!("{}", "disconnected".red())
                };
                println!("{:<4} {:<16} {:<16} {}", a.ordinal, a.session, a.phone, status);
            }
        }
    }
    Ok(())
}

/// Non-empty trimmed lines of a file
fn load_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Session name → group target list, from YAML
fn load_group_targets(path: &Path) -> Result<HashMap<String, Vec<GroupTarget>>> {
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).context(format!("Failed to parse targets file {}", path.display()))
}
