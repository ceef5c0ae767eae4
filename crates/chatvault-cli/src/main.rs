//! # chatvault
//!
//! Command-line front end for the archive engine.
//!
//! Reads a decrypted chat-backup snapshot and writes one JSON archive.
//! Exit codes:
//! - `0` the archive is complete
//! - `2` the archive was written but some rows were skipped or degraded
//! - `1` nothing was written
//!
//! Once the archive is on disk the exit code follows the archive alone; a
//! failure to write the optional summary file is only logged.

mod config;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use chatvault_engine::{export, ContactDirectory, Outcome, RunSummary};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, ExportConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,chatvault_engine=info,chatvault_store=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting chatvault v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ExportConfig::from_env().with_cli(Cli::parse());
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Run the export
    // -----------------------------------------------------------------------
    match run(config).await {
        Ok(Outcome::Complete) => ExitCode::SUCCESS,
        Ok(Outcome::Degraded) => ExitCode::from(2),
        Err(e) => {
            error!("Export failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: ExportConfig) -> anyhow::Result<Outcome> {
    let options = config.options();
    let job = config.clone();

    // rusqlite is synchronous; keep it off the runtime threads.
    let summary = tokio::task::spawn_blocking(move || {
        let contacts = match &job.contacts_path {
            Some(path) => ContactDirectory::load(path)?,
            None => ContactDirectory::new(),
        };
        export(&job.db_path, &contacts, &job.output_path, &options)
    })
    .await
    .context("export task panicked")??;

    report(&summary);
    publish_summary(&summary, config.summary_path.as_deref()).await;

    Ok(summary.outcome())
}

/// Print the summary and write it to `path` if one is configured.
///
/// Runs after the archive is committed, so failures here are warnings.
async fn publish_summary(summary: &RunSummary, path: Option<&Path>) {
    let rendered = match serde_json::to_string_pretty(summary) {
        Ok(rendered) => rendered,
        Err(e) => {
            warn!("Failed to render run summary: {e}");
            return;
        }
    };

    if let Some(path) = path {
        if let Err(e) = write_summary(path, &rendered).await {
            warn!("Run summary not written: {e:#}");
        }
    }
    println!("{rendered}");
}

async fn write_summary(path: &Path, rendered: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    tokio::fs::write(path, format!("{rendered}\n"))
        .await
        .with_context(|| format!("writing run summary to {}", path.display()))?;
    Ok(())
}

fn report(summary: &RunSummary) {
    info!(
        chats = summary.total_chats,
        messages = summary.total_messages,
        reactions = summary.total_reactions,
        bytes = summary.archive_bytes,
        digest = summary.archive_digest.as_deref().unwrap_or("-"),
        "Archive written"
    );

    if summary.outcome() == Outcome::Degraded {
        warn!(
            degraded_rows = summary.degraded_rows(),
            malformed = ?summary.malformed_rows,
            lossy_text = ?summary.lossy_text_rows,
            orphaned = ?summary.orphaned_rows,
            dangling_identities = summary.dangling_identities,
            unresolved_replies = summary.unresolved_replies,
            unresolved_pins = summary.unresolved_pins,
            unknown_chat_messages = summary.unknown_chat_messages,
            "Archive is degraded"
        );
    }
    if !summary.absent_tables.is_empty() {
        info!(tables = ?summary.absent_tables, "Optional tables absent from snapshot");
    }
}
