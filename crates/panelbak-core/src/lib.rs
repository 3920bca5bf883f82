//! panelbak core - Panel backup fetcher
//!
//! This crate resolves a backup on a game-server panel to its signed
//! download link and streams it to disk while exposing progress.

mod api;
mod config;
mod download;
mod error;
mod progress;

pub use api::*;
pub use config::*;
pub use download::*;
pub use error::*;
pub use progress::*;

use std::path::PathBuf;
use std::sync::Arc;

/// A backup fetch, from config to an in-flight transfer
#[derive(Debug, Clone)]
pub struct BackupFetcher {
    panel: PanelClient,
    downloader: Downloader,
}

impl BackupFetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new(config: PanelConfig) -> Result<Self, PanelError> {
        Ok(Self::with_client(build_http_client()?, config))
    }

    /// Create a fetcher on an existing HTTP client
    pub fn with_client(client: reqwest::Client, config: PanelConfig) -> Self {
        Self {
            panel: PanelClient::new(client.clone(), config),
            downloader: Downloader::new(client),
        }
    }

    pub fn panel(&self) -> &PanelClient {
        &self.panel
    }

    /// Resolve the configured backup's signed URL
    pub async fn resolve(&self) -> Result<ResolvedBackup, PanelError> {
        self.panel.resolve_backup_url().await
    }

    /// Start downloading a resolved backup into `dest_dir`
    pub async fn start_download(
        &self,
        backup: &ResolvedBackup,
        dest_dir: impl Into<PathBuf>,
    ) -> Arc<DownloadTask> {
        self.downloader.start(&backup.url, dest_dir).await
    }
}
