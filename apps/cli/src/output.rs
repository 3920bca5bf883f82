//! Output formatting utilities

use console::{style, StyledObject};
use panelbak_types::{Backup, TransferProgress};

/// Start-of-download styling
pub fn info<D>(text: D) -> StyledObject<D> {
    style(text).cyan().bold()
}

/// Progress styling
pub fn progress<D>(text: D) -> StyledObject<D> {
    style(text).green().bright().bold()
}

/// One progress readout, e.g. `  transferred 3 / 10 megabytes (30.00%)`
pub fn progress_line(p: &TransferProgress) -> String {
    format!(
        "  transferred {} / {} megabytes ({:.2}%)",
        p.downloaded_mb(),
        p.total_mb(),
        p.percent()
    )
}

/// Format bytes as human-readable
pub fn format_bytes(bytes: u64) -> String {
    human_bytes::human_bytes(bytes as f64)
}

#[derive(tabled::Tabled)]
pub struct BackupRow {
    #[tabled(rename = "#")]
    pub index: usize,
    pub name: String,
    pub state: &'static str,
    pub created: String,
    pub size: String,
    pub uuid: String,
}

impl BackupRow {
    pub fn new(index: usize, backup: &Backup) -> Self {
        Self {
            index,
            name: backup.name.clone(),
            state: backup.state_label(),
            created: backup
                .created_at
                .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
            size: format_bytes(backup.bytes),
            uuid: backup.uuid.clone(),
        }
    }
}
