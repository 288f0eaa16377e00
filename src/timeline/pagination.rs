//! Cursor pagination over the timeline streams.

use super::Timeline;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{StreamKind, TimelinePage};

/// What [`Timeline::advance`] did with a page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkerStep {
    /// The next page of the same stream was requested
    NextPage,
    /// The stream was exhausted and the given stream started
    NextStream(StreamKind),
    /// Every stream is exhausted; detail resolution has been seeded
    Seeded,
    /// The page did not belong to the stream being walked and was dropped
    Ignored,
}

impl Timeline {
    /// Request the first page of the first stream
    pub async fn start(&mut self, transport: &dyn Transport) -> Result<()> {
        let stream = StreamKind::TimelineTransactions;
        self.stream = Some(stream);
        transport.request_page(stream, None).await?;
        Ok(())
    }

    /// Consume one page of `stream` and decide how to continue
    ///
    /// Items are merged by id, first writer wins. A missing cursor, an empty
    /// page or an oldest item older than the cutoff exhausts the stream.
    pub async fn advance(
        &mut self,
        transport: &dyn Transport,
        stream: StreamKind,
        page: TimelinePage,
    ) -> Result<WalkerStep> {
        if self.seeded || self.stream != Some(stream) {
            tracing::warn!(%stream, "Received page for a stream that is not being walked");
            return Ok(WalkerStep::Ignored);
        }

        let page_no = {
            let count = self.pages.entry(stream).or_default();
            *count += 1;
            *count
        };
        let item_count = page.items.len();
        tracing::info!("Received #{page_no:<2} {stream} page ({item_count} items)");

        let oldest = page.oldest_timestamp();
        let mut inserted = 0;
        for item in page.items {
            if self.insert(item, stream) {
                inserted += 1;
            }
        }
        if inserted < item_count {
            tracing::debug!(%stream, duplicates = item_count - inserted, "Merged duplicate events");
        }

        let past_cutoff = matches!(
            (self.cutoff_millis, oldest),
            (Some(cutoff), Some(oldest)) if oldest < cutoff
        );

        match page.cursors.after {
            Some(cursor) if item_count > 0 && !past_cutoff => {
                transport.request_page(stream, Some(&cursor)).await?;
                Ok(WalkerStep::NextPage)
            }
            _ => {
                if past_cutoff {
                    tracing::debug!(%stream, "Reached the age cutoff");
                }
                self.finish_stream(transport, stream).await
            }
        }
    }

    async fn finish_stream(
        &mut self,
        transport: &dyn Transport,
        stream: StreamKind,
    ) -> Result<WalkerStep> {
        if let Some(next) = stream.next() {
            self.stream = Some(next);
            transport.request_page(next, None).await?;
            return Ok(WalkerStep::NextStream(next));
        }

        self.stream = None;
        self.seeded = true;
        self.pending = (0..self.events.len()).collect();
        self.total = self.events.len();
        tracing::info!(events = self.total, "Received all timelines, requesting details");

        let batch = self.window.capacity().min(self.pending.len());
        self.fill_window(transport, batch).await?;
        Ok(WalkerStep::Seeded)
    }
}
