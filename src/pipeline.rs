//! The sync pipeline: timeline, classification, exports, downloads.
//!
//! [`Pipeline::run`] executes the two phases of a sync back to back:
//!
//! 1. A single sequencer pulls inbound messages from the [`Transport`] one at a
//!    time, feeding pages to the walker and detail payloads to the resolution
//!    window and the classifier. Documents are only queued here.
//! 2. Once every expected detail has arrived, the exports are flushed and the
//!    [`DownloadQueue`] is drained with bounded parallelism.
//!
//! The first fatal error ends the run and is returned to the caller.

use crate::classify::{ClassifyContext, Classifier};
use crate::config::Config;
use crate::downloader::{DocumentFetcher, DownloadQueue, DrainSummary, HttpFetcher};
use crate::error::{Error, Result, TransportError};
use crate::export::Exporter;
use crate::history::HistoryStore;
use crate::timeline::Timeline;
use crate::transport::{InboundMessage, SubscriptionKind, Transport};
use crate::types::{DetailPayload, StreamKind, SyncEvent, TimelinePage};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Outcome of a successful run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Distinct events accumulated from all streams
    pub events: usize,
    /// Detail payloads received
    pub details: usize,
    /// Events skipped without a detail request
    pub skipped: usize,
    /// Export files written
    pub exports: Vec<PathBuf>,
    /// Download phase result
    pub downloads: DrainSummary,
}

/// One sync run over a transport session
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    timeline: Timeline,
    classifier: Classifier,
    context: ClassifyContext,
    exporter: Exporter,
    queue: DownloadQueue,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl Pipeline {
    /// Prepare a run: validate `config`, create the output directory and load history
    pub async fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        tokio::fs::create_dir_all(&config.output_dir).await?;

        let history = HistoryStore::load(config.history_path()).await?;
        let (event_tx, _rx) = broadcast::channel(1000);
        let queue = DownloadQueue::new(history, fetcher, config.download.max_workers)
            .with_events(event_tx.clone());

        Ok(Self {
            transport,
            timeline: Timeline::new(&config),
            classifier: Classifier::new(),
            context: ClassifyContext::from_config(&config),
            exporter: Exporter::new(&config.output_dir),
            queue,
            event_tx,
        })
    }

    /// Like [`Pipeline::new`], fetching documents with an [`HttpFetcher`] built from `config.download`
    pub async fn with_http_fetcher(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.download)?);
        Self::new(config, transport, fetcher).await
    }

    /// Use `classifier` instead of the built-in handler table
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Subscribe to progress events
    ///
    /// Each subscriber receives every event independently. A subscriber that
    /// falls more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: SyncEvent) {
        self.event_tx.send(event).ok();
    }

    /// Run both phases to completion
    pub async fn run(mut self) -> Result<RunSummary> {
        let transport = Arc::clone(&self.transport);

        self.timeline.start(transport.as_ref()).await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to request the first timeline page");
        })?;

        while !self.timeline.take_completion() {
            let message = match transport.receive().await {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(error = %e, "Transport failure, aborting");
                    return Err(e.into());
                }
            };
            self.handle(transport.as_ref(), message)
                .await
                .inspect_err(|e| tracing::error!(error = %e, "Timeline failure, aborting"))?;
        }
        tracing::info!(
            details = self.timeline.received(),
            skipped = self.timeline.skipped(),
            "Received all details"
        );

        let exports = self.exporter.flush(self.timeline.events()).await?;
        self.emit_event(SyncEvent::ExportsWritten {
            files: exports.clone(),
        });

        let downloads = self.queue.drain().await?;
        self.emit_event(SyncEvent::Finished {
            downloaded: downloads.downloaded,
        });

        Ok(RunSummary {
            events: self.timeline.events().len(),
            details: self.timeline.received(),
            skipped: self.timeline.skipped(),
            exports,
            downloads,
        })
    }

    async fn handle(&mut self, transport: &dyn Transport, message: InboundMessage) -> Result<()> {
        match message.kind {
            SubscriptionKind::Stream(stream) => {
                let page: TimelinePage = decode(&message.kind, message.payload)?;
                self.on_page(transport, stream, page).await
            }
            SubscriptionKind::TimelineDetail => {
                let payload: DetailPayload = decode(&message.kind, message.payload)?;
                self.on_detail(transport, payload).await
            }
            SubscriptionKind::Other(kind) => {
                tracing::warn!(
                    subscription_id = %message.subscription_id,
                    %kind,
                    "unmatched subscription"
                );
                Ok(())
            }
        }
    }

    async fn on_page(
        &mut self,
        transport: &dyn Transport,
        stream: StreamKind,
        page: TimelinePage,
    ) -> Result<()> {
        let items = page.items.len();
        self.timeline.advance(transport, stream, page).await?;
        self.emit_event(SyncEvent::PageReceived {
            stream,
            page: self.timeline.pages(stream),
            items,
        });
        Ok(())
    }

    async fn on_detail(&mut self, transport: &dyn Transport, payload: DetailPayload) -> Result<()> {
        let Some(id) = self.timeline.on_detail_received(transport, payload).await? else {
            return Ok(());
        };
        let Some(event) = self.timeline.event(&id) else {
            return Ok(());
        };

        let classification = self.classifier.classify(event, &self.context);
        self.exporter.record(classification.rows);
        for document in classification.documents {
            self.queue.enqueue(&document.url, document.destination).await;
        }

        let received = self.timeline.received();
        let total = self.timeline.total();
        let width = total.to_string().len();
        tracing::info!("{received:>width$}/{total}: {}", classification.summary);

        self.emit_event(SyncEvent::DetailResolved {
            id,
            received,
            total,
            summary: classification.summary,
        });
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: &SubscriptionKind,
    payload: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| {
        Error::Transport(TransportError::Malformed {
            kind: kind.as_wire().to_string(),
            reason: e.to_string(),
        })
    })
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("timeline", &self.timeline)
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}
