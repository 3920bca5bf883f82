//! Shared types for panelbak
//!
//! This crate contains the panel response documents and the transfer
//! state used by both the core library and the CLI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bytes in one megabyte as reported by the progress readout
pub const BYTES_PER_MEGABYTE: u64 = 1_048_576;

// ============================================================================
// Panel Documents
// ============================================================================

/// Response of `GET /api/client/servers/{server}/backups`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupListResponse {
    #[serde(default)]
    pub data: Vec<BackupData>,
}

impl BackupListResponse {
    /// Unwrap the `attributes` envelope of every entry
    pub fn into_backups(self) -> Vec<Backup> {
        self.data.into_iter().map(|b| b.attributes).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupData {
    pub attributes: Backup,
}

/// A single backup as the panel describes it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub is_successful: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Backup {
    /// `ok`, `running` while the panel has not finished it, or `failed`
    pub fn state_label(&self) -> &'static str {
        match (self.is_successful, self.completed_at) {
            (true, _) => "ok",
            (false, None) => "running",
            (false, Some(_)) => "failed",
        }
    }
}

// ============================================================================
// Transfer Types
// ============================================================================

/// Lifecycle of a single file transfer
///
/// `Pending -> InProgress -> {Completed | Failed}`; the last two are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }
}

/// Point-in-time view of a transfer's byte counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferProgress {
    pub downloaded: u64,
    /// Zero while the size is unknown
    pub total: u64,
}

impl TransferProgress {
    pub fn new(downloaded: u64, total: u64) -> Self {
        Self { downloaded, total }
    }

    pub fn downloaded_mb(&self) -> u64 {
        self.downloaded / BYTES_PER_MEGABYTE
    }

    pub fn total_mb(&self) -> u64 {
        self.total / BYTES_PER_MEGABYTE
    }

    /// Percent complete in `[0, 100]`, zero while the size is unknown
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let pct = (self.downloaded as f64 / self.total as f64) * 100.0;
        pct.clamp(0.0, 100.0)
    }
}
