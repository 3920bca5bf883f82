//! Single-file download engine
//!
//! Key principles:
//! - One DownloadTask per transfer, written by one background tokio task
//! - Direct HTTP stream to file writes
//! - Atomic counters for progress tracking
//! - A watch channel carries the status and doubles as the completion signal

use crate::error::PanelError;
use futures::StreamExt;
use panelbak_types::{TransferProgress, TransferStatus};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Longest slice of an HTML error page kept in the error message
const HTML_ERROR_EXCERPT: usize = 200;

/// One in-flight (or finished) transfer
#[derive(Debug)]
pub struct DownloadTask {
    /// Source URL
    url: String,
    /// Directory the file lands in
    dest_dir: PathBuf,
    /// Final path, known once response headers arrive
    path: Mutex<Option<PathBuf>>,
    /// HTTP status line of the response
    http_status: Mutex<Option<String>>,
    /// Bytes written so far
    downloaded_bytes: AtomicU64,
    /// Declared size, zero while unknown
    total_size: AtomicU64,
    /// Terminal error, set only on failure
    error: Mutex<Option<String>>,
    /// Lifecycle state and completion signal
    status_tx: watch::Sender<TransferStatus>,
}

impl DownloadTask {
    pub(crate) fn new(url: impl Into<String>, dest_dir: impl Into<PathBuf>) -> Self {
        let (status_tx, _) = watch::channel(TransferStatus::Pending);
        Self {
            url: url.into(),
            dest_dir: dest_dir.into(),
            path: Mutex::new(None),
            http_status: Mutex::new(None),
            downloaded_bytes: AtomicU64::new(0),
            total_size: AtomicU64::new(0),
            error: Mutex::new(None),
            status_tx,
        }
    }

    pub fn status(&self) -> TransferStatus {
        *self.status_tx.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn progress(&self) -> TransferProgress {
        TransferProgress::new(
            self.downloaded_bytes.load(Ordering::Acquire),
            self.total_size.load(Ordering::Acquire),
        )
    }

    /// Destination path, once the filename has been inferred
    pub fn path(&self) -> Option<PathBuf> {
        self.path.lock().clone()
    }

    /// File name component of the destination path
    pub fn filename(&self) -> Option<String> {
        self.path()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    /// Status line of the HTTP response, e.g. `200 OK`
    pub fn http_status(&self) -> Option<String> {
        self.http_status.lock().clone()
    }

    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// Resolve once the transfer reaches a terminal state
    pub async fn wait(&self) {
        let mut rx = self.status_tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel
        let _ = rx.wait_for(|status| status.is_terminal()).await;
    }

    /// Snapshot of the terminal state
    pub fn outcome(&self) -> TransferOutcome {
        TransferOutcome {
            status: self.status(),
            path: self.path(),
            progress: self.progress(),
            error: self.error(),
        }
    }

    pub(crate) fn set_total(&self, total: u64) {
        self.total_size.store(total, Ordering::Release);
    }

    pub(crate) fn record_bytes(&self, len: u64) {
        self.downloaded_bytes.fetch_add(len, Ordering::AcqRel);
    }

    pub(crate) fn set_path(&self, path: PathBuf) {
        *self.path.lock() = Some(path);
    }

    pub(crate) fn set_http_status(&self, status: reqwest::StatusCode) {
        *self.http_status.lock() = Some(status.to_string());
    }

    pub(crate) fn mark_in_progress(&self) {
        self.status_tx.send_if_modified(|status| {
            if *status == TransferStatus::Pending {
                *status = TransferStatus::InProgress;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn complete(&self) {
        info!("Download {} completed", self.url);
        self.finish(TransferStatus::Completed);
    }

    pub(crate) fn fail(&self, message: impl Into<String>) {
        if self.is_finished() {
            return;
        }
        let message = message.into();
        error!("Download {} failed: {}", self.url, message);
        *self.error.lock() = Some(message);
        self.finish(TransferStatus::Failed);
    }

    fn finish(&self, terminal: TransferStatus) {
        self.status_tx.send_if_modified(|status| {
            if status.is_terminal() {
                false
            } else {
                *status = terminal;
                true
            }
        });
    }
}

/// Final state of a transfer as seen by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub status: TransferStatus,
    pub path: Option<PathBuf>,
    pub progress: TransferProgress,
    pub error: Option<String>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Completed
    }
}

/// Starts transfers on a shared HTTP client
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Request `url` and stream the body into `dest_dir` in the background
    ///
    /// Returns once response headers are in. Every failure, including a
    /// request that never connects, is recorded on the returned task.
    pub async fn start(&self, url: &str, dest_dir: impl Into<PathBuf>) -> Arc<DownloadTask> {
        let task = Arc::new(DownloadTask::new(url, dest_dir));
        info!("Starting download: {}", url);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                task.fail(PanelError::from(e).to_string());
                return task;
            }
        };

        if let Err(e) = check_response(&task, &response) {
            task.fail(e.to_string());
            return task;
        }

        if is_html(response.headers()) {
            let text = response.text().await.unwrap_or_default();
            task.fail(format!(
                "server returned an HTML page instead of the backup: {}",
                excerpt(&text)
            ));
            return task;
        }

        let filename = infer_filename(response.headers(), response.url());
        let path = unique_path(&task.dest_dir.join(&filename)).await;
        debug!("Download {} -> {}", task.url, path.display());
        task.set_path(path);

        task.mark_in_progress();
        let worker = Arc::clone(&task);
        tokio::spawn(async move {
            debug!("Spawned transfer for {}", worker.url);
            match stream_to_file(&worker, response).await {
                Ok(()) => worker.complete(),
                Err(e) => worker.fail(e.to_string()),
            }
        });

        task
    }
}

/// Record status and declared size, rejecting non-2xx responses
fn check_response(task: &DownloadTask, response: &Response) -> Result<(), PanelError> {
    let status = response.status();
    task.set_http_status(status);
    if !status.is_success() {
        return Err(PanelError::Download(format!("server responded with {}", status)));
    }

    if let Some(total) = response.content_length() {
        task.set_total(total);
    }
    Ok(())
}

async fn stream_to_file(task: &DownloadTask, response: Response) -> Result<(), PanelError> {
    let path = task
        .path()
        .ok_or_else(|| PanelError::Download("destination path not resolved".to_string()))?;
    let mut file = File::create(&path).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result?;
        file.write_all(&chunk).await?;
        task.record_bytes(chunk.len() as u64);
    }

    file.flush().await?;
    file.sync_all().await?;

    let progress = task.progress();
    if progress.total > 0 && progress.downloaded < progress.total {
        return Err(PanelError::Download(format!(
            "connection closed after {} of {} bytes",
            progress.downloaded, progress.total
        )));
    }
    Ok(())
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false)
}

fn excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(HTML_ERROR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Pick a filename from `Content-Disposition`, then the URL path, then a default
pub fn infer_filename(headers: &HeaderMap, url: &url::Url) -> String {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(disposition_filename)
        .or_else(|| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .and_then(sanitize_filename)
        })
        .unwrap_or_else(|| "download".to_string())
}

fn disposition_filename(value: &str) -> Option<String> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|param| {
            let (key, val) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("filename") {
                Some(val.trim().trim_matches('"'))
            } else {
                None
            }
        })
        .and_then(sanitize_filename)
}

/// Keep only the final path component so a name can never leave the target directory
fn sanitize_filename(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Get unique path (avoid clobbering an existing file)
async fn unique_path(path: &Path) -> PathBuf {
    let mut counter = 1;
    let mut new_path = path.to_path_buf();

    while tokio::fs::try_exists(&new_path).await.unwrap_or(false) {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let new_name = match path.extension() {
            Some(ext) => format!("{} ({}).{}", stem, counter, ext.to_string_lossy()),
            None => format!("{} ({})", stem, counter),
        };
        new_path = path.with_file_name(new_name);
        counter += 1;

        if counter > 10000 {
            warn!("Gave up finding a free name next to {}", path.display());
            return new_path;
        }
    }

    new_path
}
