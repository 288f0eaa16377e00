//! Session transport seam.
//!
//! Authentication, the websocket connection and subscription bookkeeping live
//! outside this crate. The pipeline only needs to fire requests and pull the
//! next inbound message; [`Transport`] is that narrow interface.

use crate::error::TransportError;
use crate::types::{EventId, StreamKind};
use async_trait::async_trait;
use serde_json::Value;

/// Correlation id binding a request to its eventual response
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an inbound message answers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// A page of a timeline stream
    Stream(StreamKind),
    /// A detail payload (`timelineDetailV2`)
    TimelineDetail,
    /// Anything else the session delivered
    Other(String),
}

impl SubscriptionKind {
    /// Wire name of the detail subscription
    pub const TIMELINE_DETAIL: &'static str = "timelineDetailV2";

    /// Map a wire subscription type to a kind
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "timelineTransactions" => SubscriptionKind::Stream(StreamKind::TimelineTransactions),
            "timelineActivityLog" => SubscriptionKind::Stream(StreamKind::TimelineActivityLog),
            Self::TIMELINE_DETAIL => SubscriptionKind::TimelineDetail,
            other => SubscriptionKind::Other(other.to_string()),
        }
    }

    /// Wire name of this kind
    pub fn as_wire(&self) -> &str {
        match self {
            SubscriptionKind::Stream(stream) => stream.subscription_type(),
            SubscriptionKind::TimelineDetail => Self::TIMELINE_DETAIL,
            SubscriptionKind::Other(kind) => kind,
        }
    }
}

/// One message pulled from the multiplexed channel
#[derive(Clone, Debug)]
pub struct InboundMessage {
    /// Subscription the message answers
    pub subscription_id: SubscriptionId,
    /// Subscription kind
    pub kind: SubscriptionKind,
    /// Raw JSON payload
    pub payload: Value,
}

/// Multiplexed request/response session
///
/// Requests are fire-and-forget: implementations send them and return without
/// waiting for the answer, which later arrives through [`receive`](Transport::receive).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Request one page of `stream`, starting after `cursor` (first page when `None`)
    async fn request_page(
        &self,
        stream: StreamKind,
        cursor: Option<&str>,
    ) -> Result<SubscriptionId, TransportError>;

    /// Request the detail payload of one event
    async fn request_detail(&self, id: &EventId) -> Result<SubscriptionId, TransportError>;

    /// Wait for the next inbound message
    async fn receive(&self) -> Result<InboundMessage, TransportError>;
}
