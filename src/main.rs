use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flowlog::domain::ExecutionStatus;
use flowlog::executor::{ExecutorClient, HttpExecutorClient};
use flowlog::history::{DirectoryFetcher, HistoryEvent, InlineOnly, JsonlHistoryFile, PayloadFetcher};
use flowlog::id::{generate_execution_id, parse_execution_id};
use flowlog::projection::{CompactProjector, DegradedEvent, ExecutionView, TimelineAssembler, summarize};
use flowlog::store::HistoryStore;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("flowlog")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("flowlog.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    // RUST_LOG wins over the configured level
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level.unwrap_or("info"));
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Hex SHA-256 of the serialized output
fn output_digest(json: &str) -> String {
    hex::encode(Sha256::digest(json.as_bytes()))
}

fn emit<T: Serialize>(value: &T, digest: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    if digest {
        println!("{}", output_digest(&json));
    } else {
        println!("{}", json);
    }
    Ok(())
}

fn report_degraded(degraded: &[DegradedEvent]) {
    for event in degraded {
        eprintln!("{} event {}: {}", "degraded".yellow(), event.event_id, event.reason);
    }
}

fn payload_fetcher(config: &Config) -> Arc<dyn PayloadFetcher> {
    match &config.storage.blob_dir {
        Some(dir) => Arc::new(DirectoryFetcher::new(dir)),
        None => Arc::new(InlineOnly),
    }
}

fn read_history(file: &Path) -> Result<Vec<HistoryEvent>> {
    let read = JsonlHistoryFile::new(file)
        .read()
        .context(format!("Failed to read history from {}", file.display()))?;
    report_degraded(&read.skipped);
    Ok(read.events)
}

fn execution_id_for(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

fn open_store(config: &Config) -> Result<HistoryStore> {
    let store = HistoryStore::open_at(&config.storage.store_dir).context(format!(
        "Failed to open history store at {}",
        config.storage.store_dir.display()
    ))?;
    report_degraded(store.skipped());
    Ok(store)
}

fn status_colored(status: ExecutionStatus) -> ColoredString {
    match status {
        ExecutionStatus::Completed => status.as_str().green(),
        ExecutionStatus::Running | ExecutionStatus::ContinuedAsNew => status.as_str().cyan(),
        _ => status.as_str().red(),
    }
}

async fn handle_timeline_command(file: &Path, cli: &Cli, config: &Config) -> Result<()> {
    let history = read_history(file)?;
    let fetcher = payload_fetcher(config);
    let mut assembler = TimelineAssembler::new(fetcher.as_ref());
    let mut events = Vec::new();
    for event in &history {
        if let Some(derived) = assembler.apply(event).await {
            events.push(derived);
        }
    }
    report_degraded(assembler.degraded());
    emit(&events, cli.digest)
}

async fn handle_compact_command(file: &Path, cli: &Cli, config: &Config) -> Result<()> {
    let history = read_history(file)?;
    let fetcher = payload_fetcher(config);
    let mut projector = CompactProjector::new(fetcher.as_ref());
    for event in &history {
        projector.apply(event).await;
    }
    report_degraded(projector.degraded());
    emit(&projector.rows(), cli.digest)
}

fn handle_summary_command(file: &Path, cli: &Cli) -> Result<()> {
    let history = read_history(file)?;
    let summary = summarize(&execution_id_for(file), &history);
    if cli.is_verbose() {
        eprintln!(
            "{} {} ({} events)",
            summary.id.bold(),
            status_colored(summary.status),
            summary.history_length
        );
    }
    emit(&summary, cli.digest)
}

/// A bare workflow id gets a fresh execution suffix
fn resolve_execution_id(id: &str) -> String {
    match parse_execution_id(id) {
        Some(_) => id.to_string(),
        None => generate_execution_id(id),
    }
}

fn handle_import_command(execution_id: &str, file: &Path, config: &Config) -> Result<()> {
    let history = read_history(file)?;
    let execution_id = resolve_execution_id(execution_id);
    let execution_id = execution_id.as_str();
    let store = open_store(config)?;
    let appended = store
        .append(execution_id, &history)
        .context(format!("Failed to import history for {}", execution_id))?;
    println!("{} {} events into {}", "Imported".green(), appended, execution_id.bold());
    Ok(())
}

async fn handle_show_command(execution_ids: &[String], compact: bool, cli: &Cli, config: &Config) -> Result<()> {
    let store = Arc::new(open_store(config)?);
    let view = ExecutionView::new(store, payload_fetcher(config))
        .with_max_concurrent(config.projection.max_concurrent_executions);

    if compact {
        let mut reads = Vec::new();
        for (id, read) in view.read_compact_many(execution_ids).await {
            reads.push(read.context(format!("Failed to read execution {}", id))?);
        }
        return emit(&reads, cli.digest);
    }

    let mut reads = Vec::new();
    for id in execution_ids {
        let read = view.read(id).await.context(format!("Failed to read execution {}", id))?;
        reads.push(read);
    }
    emit(&reads, cli.digest)
}

fn handle_executions_command(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let executions = store.executions().context("Failed to list executions")?;
    if executions.is_empty() {
        println!("{}", "No executions stored".yellow());
        return Ok(());
    }
    for entry in executions {
        let summary = summarize(&entry.execution_id, &store.load(&entry.execution_id)?);
        println!(
            "{:<48} {:<16} {:>6} events  last at {}",
            entry.execution_id.bold(),
            status_colored(summary.status),
            entry.event_count,
            entry.last_event_time.to_rfc3339()
        );
    }
    Ok(())
}

async fn handle_validate_command(action: &str, args: &str, cli: &Cli, config: &Config) -> Result<()> {
    let args: serde_json::Value = serde_json::from_str(args).context("Arguments must be JSON")?;
    let client = HttpExecutorClient::new(config.executor.to_client_config())?;
    let response = client.validate_action(action, &args).await?;
    if !response.ok {
        eprintln!("{} {}", "Invalid:".red(), response.message);
    }
    emit(&response, cli.digest)
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        eprintln!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Timeline { file } => handle_timeline_command(file, cli, config).await,
        Commands::Compact { file } => handle_compact_command(file, cli, config).await,
        Commands::Summary { file } => handle_summary_command(file, cli),
        Commands::Import { execution_id, file } => handle_import_command(execution_id, file, config),
        Commands::Show { execution_ids, compact } => handle_show_command(execution_ids, *compact, cli, config).await,
        Commands::Executions => handle_executions_command(config),
        Commands::Validate { action, args } => handle_validate_command(action, args, cli, config).await,
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    let runtime = tokio::runtime::Runtime::new().map_err(|e| eyre!("Failed to start runtime: {}", e))?;
    runtime.block_on(run_application(&cli, &config)).context("Application failed")?;

    Ok(())
}
