use std::io::Read;
use std::path::Path;

use anyhow::Context;
use chrono::DateTime;
use colored::Colorize;
use gitvm_ledger::{
    verify_ledger, Ledger, LedgerError, ReconcileOutcome, SliceOptions, VerifyOutcome,
};
use gitvm_server::{GitvmServer, ServerConfig};
use gitvm_types::Receipt;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Verify(args) => cmd_verify(&args.dir, format),
        Command::Root(args) => cmd_root(&args.dir, format),
        Command::Log(args) => cmd_log(args, format),
        Command::Slice(args) => cmd_slice(args, format),
        Command::Emit(args) => cmd_emit(args, format),
        Command::Reconcile(args) => cmd_reconcile(&args.dir, format),
        Command::Serve(args) => cmd_serve(args),
    }
}

fn cmd_verify(dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    match verify_ledger(dir) {
        Ok(outcome) => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&outcome)?),
                OutputFormat::Text => match outcome {
                    VerifyOutcome::Empty => {
                        println!("{} Ledger is empty", "✓".green().bold());
                    }
                    VerifyOutcome::Verified { receipts, root } => {
                        println!("{} Receipt chain integrity verified", "✓".green().bold());
                        println!("  Receipts: {}", receipts.to_string().bold());
                        println!("  Root: {}", root.cyan());
                    }
                },
            }
            Ok(())
        }
        Err(err) => {
            let index = match &err {
                LedgerError::Integrity(e) => e.index(),
                _ => None,
            };
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    json!({ "outcome": "failed", "index": index, "error": err.to_string() })
                ),
                OutputFormat::Text => {
                    println!("{} Verification failed", "✗".red().bold());
                    if let Some(index) = index {
                        println!("  Receipt: {}", format!("#{index}").yellow());
                    }
                    println!("  {}", err.to_string().red());
                }
            }
            Err(anyhow::Error::new(err).context(format!("verification of {} failed", dir.display())))
        }
    }
}

fn cmd_root(dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let root = Ledger::new(dir).get_root()?;
    match format {
        OutputFormat::Json => println!("{}", json!({ "root": root })),
        OutputFormat::Text => println!("{root}"),
    }
    Ok(())
}

fn cmd_log(args: LogArgs, format: OutputFormat) -> anyhow::Result<()> {
    let receipts = Ledger::new(&args.dir).recent(args.limit)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&receipts)?),
        OutputFormat::Text if receipts.is_empty() => println!("No receipts."),
        OutputFormat::Text => {
            for receipt in &receipts {
                print_receipt(receipt);
            }
        }
    }
    Ok(())
}

fn print_receipt(receipt: &Receipt) {
    println!(
        "{}  {}  {}",
        receipt.short_root().yellow(),
        format_ts(receipt.ts_unix_ms).dimmed(),
        receipt.event_type().cyan().bold()
    );
    println!("  {} by {}", receipt.repo.full.bold(), receipt.actor);
    println!("  {}", receipt.payload);
}

/// RFC 3339 in UTC, or the raw number when it is out of range.
fn format_ts(ts_unix_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_unix_ms)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| ts_unix_ms.to_string())
}

fn cmd_slice(args: SliceArgs, format: OutputFormat) -> anyhow::Result<()> {
    let options = SliceOptions {
        cursor: args.cursor,
        since_ts: args.since_ts,
        until_ts: args.until_ts,
        since_root: args.since_root,
        until_root: args.until_root,
        limit: args.limit,
    };
    let slice = Ledger::new(&args.dir).read_slice(&options)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&slice)?),
        OutputFormat::Text => {
            for line in &slice.lines {
                println!("{line}");
            }
            eprintln!(
                "{} lines, next cursor {}, file size {}",
                slice.lines.len(),
                slice.next_cursor.to_string().bold(),
                slice.file_size
            );
        }
    }
    Ok(())
}

fn read_event(file: Option<&Path>) -> anyhow::Result<Receipt> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read event from stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("event is not a valid receipt")
}

fn cmd_emit(args: EmitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let event = read_event(args.file.as_deref())?;
    let stored = Ledger::new(&args.dir).emit(event)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&stored)?),
        OutputFormat::Text => {
            println!("{} Receipt appended", "✓".green().bold());
            println!("  Type: {}", stored.event_type().cyan());
            println!("  Time: {}", format_ts(stored.ts_unix_ms));
            println!("  Root: {}", stored.root.yellow());
        }
    }
    Ok(())
}

fn cmd_reconcile(dir: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = Ledger::new(dir).reconcile()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&outcome)?),
        OutputFormat::Text => match outcome {
            ReconcileOutcome::Empty => println!("Ledger is empty."),
            ReconcileOutcome::Consistent { root } => {
                println!("{} Root pointer consistent: {}", "✓".green().bold(), root.cyan());
            }
            ReconcileOutcome::Republished { previous, root } => {
                println!("{} Root pointer republished", "✓".green().bold());
                println!("  Was: {}", previous.dimmed());
                println!("  Now: {}", root.cyan());
            }
        },
    }
    Ok(())
}

fn server_config(args: &ServeArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_toml_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(ledger) = &args.ledger {
        config.ledger_dir = ledger.clone();
    }
    config.validate()?;
    Ok(config)
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = server_config(&args)?;
    println!(
        "GitVM ledger server on {} (ledger: {})",
        config.bind_addr.to_string().bold(),
        config.ledger_dir.display()
    );
    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(GitvmServer::new(config).serve())?;
    Ok(())
}
