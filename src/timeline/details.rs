//! Detail screening and resolution.

use super::Timeline;
use crate::error::Result;
use crate::transport::Transport;
use crate::types::{DetailPayload, EventId, TimelineEvent};

/// Action type whose payload names the event's detail view
const DETAIL_ACTION: &str = "timelineDetail";

/// Why an event gets no detail request
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SkipReason {
    TooOld,
    NoAction,
    ForeignAction(String),
    PayloadMismatch,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooOld => f.write_str("too old"),
            SkipReason::NoAction => f.write_str("no action"),
            SkipReason::ForeignAction(kind) => write!(f, "action type '{kind}'"),
            SkipReason::PayloadMismatch => f.write_str("action payload differs from id"),
        }
    }
}

/// Decide whether `event` can be resolved
pub(crate) fn screen(event: &TimelineEvent, cutoff_millis: Option<i64>) -> Option<SkipReason> {
    if cutoff_millis.is_some_and(|cutoff| event.timestamp < cutoff) {
        return Some(SkipReason::TooOld);
    }
    match &event.action {
        None if event.action_label.is_none() => Some(SkipReason::NoAction),
        None => None,
        Some(action) if action.kind != DETAIL_ACTION => {
            Some(SkipReason::ForeignAction(action.kind.clone()))
        }
        Some(action) if action.payload_str() != Some(event.id.as_str()) => {
            Some(SkipReason::PayloadMismatch)
        }
        Some(_) => None,
    }
}

impl Timeline {
    /// Request details for up to `n` pending events, skipping unresolvable ones
    ///
    /// Skipped events are dropped from the total and do not count towards `n`.
    /// Stops early when the window is full.
    pub(crate) async fn fill_window(&mut self, transport: &dyn Transport, n: usize) -> Result<()> {
        let mut issued = 0;
        while issued < n {
            let Some(idx) = self.pending.pop_front() else {
                break;
            };

            if let Some(reason) = screen(&self.events[idx], self.cutoff_millis) {
                self.skip(idx, &reason);
                continue;
            }
            if !self.window.try_acquire() {
                self.pending.push_front(idx);
                break;
            }

            self.in_flight.insert(idx);
            transport.request_detail(&self.events[idx].id).await?;
            issued += 1;
        }
        Ok(())
    }

    fn skip(&mut self, idx: usize, reason: &SkipReason) {
        self.total -= 1;
        self.skipped += 1;
        let event = &self.events[idx];
        if self.verbosity.is_debug() {
            let dump = serde_json::to_string(event).unwrap_or_default();
            tracing::debug!(id = %event.id, %reason, event = %dump, "Skipping event, no detail available");
        } else {
            tracing::debug!(id = %event.id, %reason, "Skipping event, no detail available");
        }
    }

    /// Attach a detail payload to its event
    ///
    /// Returns the event id when the payload answered an outstanding request;
    /// stray or repeated payloads are logged and ignored. Once every
    /// outstanding request has been answered the window is refilled.
    pub async fn on_detail_received(
        &mut self,
        transport: &dyn Transport,
        payload: DetailPayload,
    ) -> Result<Option<EventId>> {
        let Some(&idx) = self.index.get(&payload.id) else {
            tracing::warn!(id = %payload.id, "Received details for an unknown event");
            return Ok(None);
        };
        if !self.in_flight.remove(&idx) {
            tracing::warn!(id = %payload.id, "Received details that were not requested");
            return Ok(None);
        }

        self.window.release();
        let id = payload.id.clone();
        self.events[idx].details = Some(payload);

        if self.window.is_idle() && !self.pending.is_empty() {
            let batch = self.window.capacity().min(self.pending.len());
            self.fill_window(transport, batch).await?;
        }
        Ok(Some(id))
    }
}
