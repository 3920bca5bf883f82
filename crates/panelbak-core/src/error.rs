//! Error types for panelbak core

use thiserror::Error;

/// Errors that can occur while fetching a backup
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("Configuration error: {key} {reason}")]
    Config { key: &'static str, reason: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Panel API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("No backup at index {index}")]
    BackupNotFound { index: usize },

    #[error("Panel returned no download URL for backup {uuid}")]
    MissingDownloadUrl { uuid: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download error: {0}")]
    Download(String),
}

impl PanelError {
    pub(crate) fn config(key: &'static str, reason: impl Into<String>) -> Self {
        PanelError::Config {
            key,
            reason: reason.into(),
        }
    }
}
