//! Error types for timeline-dl
//!
//! The taxonomy follows the two phases of a sync run:
//! - [`TransportError`] covers the multiplexed session (Phase 1).
//! - [`DownloadError`] covers document fetches and writes (Phase 2).
//!
//! Every error returned from a run is fatal to it; nothing is retried.
//! Malformed detail payloads are deliberately absent here: missing sections and
//! fields degrade to empty values inside the classifier and never surface as errors.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for timeline-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for timeline-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "detail_window")
        key: Option<String>,
    },

    /// Failure on the session channel (receive, parse, or request issuance)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Document download failure
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error bound to a key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}

/// Session/transport errors surfaced by a [`Transport`](crate::transport::Transport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// The inbound channel closed before the pipeline finished
    #[error("connection closed")]
    Closed,

    /// The remote side reported an error for a subscription
    #[error("subscription {subscription_id} failed: {message}")]
    Remote {
        /// Subscription the error belongs to
        subscription_id: String,
        /// Error message from the remote side
        message: String,
    },

    /// An inbound message could not be decoded
    #[error("malformed {kind} message: {reason}")]
    Malformed {
        /// Subscription kind of the offending message
        kind: String,
        /// Why decoding failed
        reason: String,
    },

    /// Sending a request failed
    #[error("failed to send request: {0}")]
    Send(String),
}

/// Document download errors (Phase 2)
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The fetch itself failed (connection, timeout, non-success status)
    #[error("failed to fetch {url}: {reason}")]
    FetchFailed {
        /// URL that was requested
        url: String,
        /// The reason the fetch failed
        reason: String,
    },

    /// The fetched body could not be persisted
    #[error("failed to write {path}: {reason}")]
    WriteFailed {
        /// Destination path
        path: PathBuf,
        /// The reason writing failed
        reason: String,
    },

    /// The history file could not be appended to
    #[error("failed to record {key} in history: {reason}")]
    HistoryFailed {
        /// Canonical document key
        key: String,
        /// The reason the append failed
        reason: String,
    },
}
