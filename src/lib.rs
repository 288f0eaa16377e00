//! # timeline-dl
//!
//! Incremental sync of an account's event timeline and its documents.
//!
//! A run walks the cursor-paginated timeline streams of a multiplexed session,
//! resolves the detail record of every event through a bounded request window,
//! classifies each event by type, writes CSV/JSON exports and finally downloads
//! every new document with a bounded worker pool. Documents already on disk or
//! recorded in the history file are never fetched again.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI; the caller supplies the session as a [`Transport`]
//! - **Sensible defaults** - [`Config::default`] matches the usual layout
//! - **Event-driven** - Progress is published on [`Pipeline::subscribe`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use timeline_dl::{Config, Pipeline, Transport};
//!
//! # async fn example(session: Arc<dyn Transport>) -> timeline_dl::Result<()> {
//! let config = Config {
//!     output_dir: "downloads".into(),
//!     ..Default::default()
//! };
//! timeline_dl::logging::init(config.verbosity);
//!
//! let pipeline = Pipeline::with_http_fetcher(config, session).await?;
//! let mut events = pipeline.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! let summary = pipeline.run().await?;
//! println!("Downloaded {} documents", summary.downloads.downloaded);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Event classification and per-type handlers
pub mod classify;
/// Configuration types
pub mod config;
/// Deduplicating document download queue
pub mod downloader;
/// Error types
pub mod error;
/// CSV/JSON export artifacts
pub mod export;
/// Download history file
pub mod history;
/// Logging setup
pub mod logging;
/// Two-phase sync pipeline
pub mod pipeline;
/// Timeline pagination and detail resolution
pub mod timeline;
/// Session transport seam
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use classify::{Classification, ClassifyContext, Classifier, EventHandler, EventType};
pub use config::{Config, DownloadConfig, Verbosity};
pub use downloader::{
    DocumentFetcher, DownloadQueue, DrainSummary, EnqueueOutcome, HttpFetcher,
};
pub use error::{DownloadError, Error, Result, TransportError};
pub use export::Exporter;
pub use history::HistoryStore;
pub use pipeline::{Pipeline, RunSummary};
pub use timeline::{DetailWindow, Timeline, WalkerStep};
pub use transport::{InboundMessage, SubscriptionId, SubscriptionKind, Transport};
pub use types::{
    DetailPayload, DocumentRef, EventId, ExportRow, StreamKind, SyncEvent, TimelineEvent,
    TimelinePage,
};
