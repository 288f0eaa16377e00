//! Persistent record of documents downloaded in earlier runs.
//!
//! The history file is plain text, one canonical document key per line,
//! newline-terminated and append-only. It is read once at startup and
//! appended to after every successful download.

use crate::error::{DownloadError, Error, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only set of canonical document keys
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    keys: HashSet<String>,
    file: Option<File>,
}

impl HistoryStore {
    /// Load the history file, creating it (and its parent directories) if absent
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let keys = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let keys: HashSet<String> = content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect();
                tracing::info!(
                    path = %path.display(),
                    entries = keys.len(),
                    "Found {} lines in history file",
                    keys.len()
                );
                keys
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                File::create(&path).await.map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create history file '{}': {}", path.display(), e),
                    ))
                })?;
                tracing::info!(path = %path.display(), "Created history file");
                HashSet::new()
            }
            Err(e) => return Err(Error::Io(e)),
        };

        Ok(Self {
            path,
            keys,
            file: None,
        })
    }

    /// Whether `key` was recorded in this or an earlier run
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `key` and sync it to disk before returning
    pub async fn append(&mut self, key: &str) -> Result<()> {
        if self.keys.contains(key) {
            return Ok(());
        }

        let history_failed = |e: std::io::Error| {
            Error::Download(DownloadError::HistoryFailed {
                key: key.to_string(),
                reason: e.to_string(),
            })
        };

        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(history_failed)?;
            self.file = Some(file);
        }

        if let Some(file) = self.file.as_mut() {
            file.write_all(format!("{key}\n").as_bytes())
                .await
                .map_err(history_failed)?;
            file.flush().await.map_err(history_failed)?;
            file.sync_data().await.map_err(history_failed)?;
        }

        self.keys.insert(key.to_string());
        Ok(())
    }
}
