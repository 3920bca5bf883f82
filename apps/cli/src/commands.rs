//! CLI command implementations

use crate::output::{self, BackupRow};
use anyhow::{Context, Result};
use console::style;
use panelbak_core::{
    watch_progress, BackupFetcher, PanelConfig, TransferOutcome, PROGRESS_INTERVAL,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tabled::Table;

/// Process exit code for a download that ended in the failed state
pub const EXIT_DOWNLOAD_FAILED: u8 = 1;

/// Resolve the configured backup and download it into `destination`
///
/// Returns the process exit code. Errors before the transfer starts are
/// returned as `Err`.
pub async fn download_backup<O: Write, E: Write>(
    config: PanelConfig,
    destination: PathBuf,
    out: &mut O,
    err: &mut E,
) -> Result<u8> {
    download_backup_every(config, destination, PROGRESS_INTERVAL, out, err).await
}

async fn download_backup_every<O: Write, E: Write>(
    config: PanelConfig,
    destination: PathBuf,
    interval: Duration,
    out: &mut O,
    err: &mut E,
) -> Result<u8> {
    let fetcher = BackupFetcher::new(config).context("Failed to create HTTP client")?;
    let backup = fetcher
        .resolve()
        .await
        .context("Failed to resolve backup download link")?;

    writeln!(out, "{}", output::info(format!("Downloading {}...", backup.url)))?;
    let task = fetcher.start_download(&backup, destination).await;
    if let Some(status) = task.http_status() {
        writeln!(out, "{}", output::progress(format!("  {}", status)))?;
    }

    let outcome = watch_progress(&task, interval, |p| {
        let _ = writeln!(out, "{}", output::progress(output::progress_line(&p)));
    })
    .await;

    Ok(report_outcome(&outcome, out, err)?)
}

/// Print the final line for a finished transfer and pick the exit code
pub fn report_outcome<O: Write, E: Write>(
    outcome: &TransferOutcome,
    out: &mut O,
    err: &mut E,
) -> std::io::Result<u8> {
    if !outcome.is_success() {
        writeln!(
            err,
            "Download failed: {}",
            outcome.error.as_deref().unwrap_or("unknown error")
        )?;
        return Ok(EXIT_DOWNLOAD_FAILED);
    }

    let filename = outcome
        .path
        .as_ref()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    writeln!(out, "Download saved to ./{} ", filename)?;
    Ok(0)
}

/// Print every backup of the server with the index to put in BACKUPNUM
pub async fn list_backups(config: PanelConfig) -> Result<()> {
    let fetcher = BackupFetcher::new(config).context("Failed to create HTTP client")?;
    let backups = fetcher
        .panel()
        .fetch_backups()
        .await
        .context("Failed to list backups")?;

    if backups.is_empty() {
        println!("{}", style("No backups found for this server.").dim());
        return Ok(());
    }

    let rows: Vec<BackupRow> = backups
        .iter()
        .enumerate()
        .map(|(i, b)| BackupRow::new(i, b))
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}
