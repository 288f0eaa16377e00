//! Deduplicating document download queue.
//!
//! Documents are collected during the timeline phase with [`DownloadQueue::enqueue`]
//! and fetched afterwards by [`DownloadQueue::drain`] with a bounded number of
//! concurrent workers:
//! - [`fetcher`] - HTTP document fetching

mod fetcher;

pub use fetcher::{DocumentFetcher, HttpFetcher};

use crate::error::{DownloadError, Error, Result};
use crate::history::HistoryStore;
use crate::types::SyncEvent;
use crate::utils::canonical_key;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, broadcast};

/// What [`DownloadQueue::enqueue`] decided for a document
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The document will be fetched by [`DownloadQueue::drain`]
    Scheduled,
    /// The destination file already exists
    SkippedExists,
    /// The same document or destination is already queued in this run
    SkippedQueued,
    /// The document was downloaded in an earlier run
    SkippedHistory,
}

/// Result of a completed drain
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Documents that were scheduled
    pub scheduled: usize,
    /// Documents downloaded and recorded in history
    pub downloaded: usize,
}

/// A scheduled fetch
#[derive(Clone, Debug)]
struct DownloadJob {
    url: String,
    destination: PathBuf,
    key: String,
}

/// Download queue with in-run and cross-run deduplication
pub struct DownloadQueue {
    history: Arc<Mutex<HistoryStore>>,
    fetcher: Arc<dyn DocumentFetcher>,
    max_workers: usize,
    queued_keys: HashSet<String>,
    queued_paths: HashSet<PathBuf>,
    jobs: Vec<DownloadJob>,
    event_tx: Option<broadcast::Sender<SyncEvent>>,
}

impl DownloadQueue {
    /// Create a queue backed by `history`, fetching with at most `max_workers` at a time
    pub fn new(
        history: HistoryStore,
        fetcher: Arc<dyn DocumentFetcher>,
        max_workers: usize,
    ) -> Self {
        Self {
            history: Arc::new(Mutex::new(history)),
            fetcher,
            max_workers: max_workers.max(1),
            queued_keys: HashSet::new(),
            queued_paths: HashSet::new(),
            jobs: Vec::new(),
            event_tx: None,
        }
    }

    /// Publish [`SyncEvent::DocumentDownloaded`] on `event_tx` during drain
    pub fn with_events(mut self, event_tx: broadcast::Sender<SyncEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Number of documents scheduled so far
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether nothing has been scheduled
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Schedule `url` for download to `destination` unless it is a duplicate
    ///
    /// Checks, in order: destination on disk, destination or canonical key
    /// already queued in this run, canonical key in history.
    pub async fn enqueue(&mut self, url: &str, destination: impl Into<PathBuf>) -> EnqueueOutcome {
        let destination = destination.into();

        if destination.exists() {
            tracing::debug!(path = %destination.display(), "file already exists. Skipping...");
            return EnqueueOutcome::SkippedExists;
        }

        let key = canonical_key(url);
        if self.queued_keys.contains(key) || self.queued_paths.contains(&destination) {
            tracing::debug!(url = key, "URL already in queue. Skipping...");
            return EnqueueOutcome::SkippedQueued;
        }
        if self.history.lock().await.contains(key) {
            tracing::debug!(url = key, "URL already in history. Skipping...");
            return EnqueueOutcome::SkippedHistory;
        }

        self.queued_keys.insert(key.to_string());
        self.queued_paths.insert(destination.clone());
        tracing::debug!(path = %destination.display(), "Added to queue");
        self.jobs.push(DownloadJob {
            url: url.to_string(),
            destination,
            key: key.to_string(),
        });
        EnqueueOutcome::Scheduled
    }

    /// Fetch every scheduled document and wait for all of them
    ///
    /// Completions are handled in whatever order they finish. The first failure
    /// aborts the drain: outstanding fetches are dropped and the error returned.
    /// Documents completed before the failure stay recorded in history.
    pub async fn drain(&mut self) -> Result<DrainSummary> {
        let jobs = std::mem::take(&mut self.jobs);
        let total = jobs.len();

        if total == 0 {
            tracing::info!("Nothing to download");
            return Ok(DrainSummary::default());
        }

        tracing::info!(total, workers = self.max_workers, "Waiting for downloads to complete..");
        let done = Arc::new(AtomicUsize::new(0));

        let mut completions = stream::iter(jobs)
            .map(|job| {
                let fetcher = Arc::clone(&self.fetcher);
                let history = Arc::clone(&self.history);
                let done = Arc::clone(&done);
                let event_tx = self.event_tx.clone();

                async move {
                    let body = fetcher.fetch(&job.url).await?;
                    write_document(&job.destination, &body).await?;
                    history.lock().await.append(&job.key).await?;

                    let done = done.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::debug!(
                        "{done:>3}/{total} {}",
                        job.destination
                            .file_name()
                            .map(|n| n.to_string_lossy())
                            .unwrap_or_default()
                    );
                    if let Some(tx) = &event_tx {
                        tx.send(SyncEvent::DocumentDownloaded {
                            path: job.destination.clone(),
                            done,
                            total,
                        })
                        .ok();
                    }
                    Ok::<_, Error>(job.destination)
                }
            })
            .buffer_unordered(self.max_workers);

        while let Some(result) = completions.next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Download failed, aborting");
                return Err(e);
            }
        }

        let downloaded = done.load(Ordering::SeqCst);
        tracing::info!(downloaded, "Done.");
        Ok(DrainSummary {
            scheduled: total,
            downloaded,
        })
    }
}

/// Write `body` to `destination` via a temporary sibling, creating parent directories
///
/// A crash mid-write leaves only the `.part` file behind, so the existence
/// check in [`DownloadQueue::enqueue`] never mistakes a truncated file for a
/// finished one.
async fn write_document(destination: &Path, body: &[u8]) -> Result<()> {
    let write_failed = |e: std::io::Error| {
        Error::Download(DownloadError::WriteFailed {
            path: destination.to_path_buf(),
            reason: e.to_string(),
        })
    };

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }
    if destination.exists() {
        tracing::debug!(path = %destination.display(), "file was already downloaded.");
    }

    let mut partial = destination.as_os_str().to_os_string();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    tokio::fs::write(&partial, body).await.map_err(write_failed)?;
    tokio::fs::rename(&partial, destination)
        .await
        .map_err(write_failed)?;
    Ok(())
}
