//! Scripted in-memory session transport

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use timeline_dl::{
    EventId, InboundMessage, StreamKind, SubscriptionId, SubscriptionKind, Transport,
    TransportError,
};

/// Transport answering requests from a script
///
/// Every request immediately queues its scripted response; [`Transport::receive`]
/// pops the queue and reports `Closed` once it is empty. Unscripted pages are
/// empty, unscripted details have no sections.
#[derive(Default)]
pub struct ScriptedTransport {
    pages: HashMap<(StreamKind, Option<String>), Value>,
    details: HashMap<String, Value>,
    failing_details: HashSet<String>,
    /// Deliver the most recent response first
    lifo: bool,
    inbound: Mutex<VecDeque<Result<InboundMessage, TransportError>>>,
    page_requests: Mutex<Vec<(StreamKind, Option<String>)>>,
    detail_requests: Mutex<Vec<String>>,
    outstanding: AtomicUsize,
    peak_outstanding: AtomicUsize,
    next_id: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer a request for `stream` at `cursor` with `page`
    pub fn with_page(mut self, stream: StreamKind, cursor: Option<&str>, page: Value) -> Self {
        self.pages.insert((stream, cursor.map(String::from)), page);
        self
    }

    /// Answer the detail request for `id` with `payload`
    pub fn with_detail(mut self, id: &str, payload: Value) -> Self {
        self.details.insert(id.to_string(), payload);
        self
    }

    /// Answer the detail request for `id` with a remote error
    pub fn failing_detail(mut self, id: &str) -> Self {
        self.failing_details.insert(id.to_string());
        self
    }

    /// Deliver responses newest first
    pub fn lifo(mut self) -> Self {
        self.lifo = true;
        self
    }

    pub fn page_requests(&self) -> Vec<(StreamKind, Option<String>)> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn detail_requests(&self) -> Vec<String> {
        self.detail_requests.lock().unwrap().clone()
    }

    /// Highest number of detail requests outstanding at once
    pub fn peak_outstanding(&self) -> usize {
        self.peak_outstanding.load(Ordering::SeqCst)
    }

    fn subscription_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst).to_string())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request_page(
        &self,
        stream: StreamKind,
        cursor: Option<&str>,
    ) -> Result<SubscriptionId, TransportError> {
        let key = (stream, cursor.map(String::from));
        self.page_requests.lock().unwrap().push(key.clone());

        let subscription_id = self.subscription_id();
        let payload = self.pages.get(&key).cloned().unwrap_or_else(|| json!({}));
        self.inbound.lock().unwrap().push_back(Ok(InboundMessage {
            subscription_id: subscription_id.clone(),
            kind: SubscriptionKind::Stream(stream),
            payload,
        }));
        Ok(subscription_id)
    }

    async fn request_detail(&self, id: &EventId) -> Result<SubscriptionId, TransportError> {
        self.detail_requests.lock().unwrap().push(id.to_string());
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_outstanding.fetch_max(now, Ordering::SeqCst);

        let subscription_id = self.subscription_id();
        let response = if self.failing_details.contains(id.as_str()) {
            Err(TransportError::Remote {
                subscription_id: subscription_id.to_string(),
                message: "detail unavailable".into(),
            })
        } else {
            let payload = self
                .details
                .get(id.as_str())
                .cloned()
                .unwrap_or_else(|| json!({"id": id.as_str(), "sections": []}));
            Ok(InboundMessage {
                subscription_id: subscription_id.clone(),
                kind: SubscriptionKind::TimelineDetail,
                payload,
            })
        };
        self.inbound.lock().unwrap().push_back(response);
        Ok(subscription_id)
    }

    async fn receive(&self) -> Result<InboundMessage, TransportError> {
        let next = {
            let mut inbound = self.inbound.lock().unwrap();
            if self.lifo {
                inbound.pop_back()
            } else {
                inbound.pop_front()
            }
        };
        let message = next.ok_or(TransportError::Closed)??;
        if message.kind == SubscriptionKind::TimelineDetail {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(message)
    }
}
