//! Core types for timeline-dl

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Unique identifier of a timeline event
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    /// Create a new EventId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A paginated history stream exposed by the account API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Money movements (trades, payments, card transactions)
    TimelineTransactions,
    /// Everything else (documents, reports, account notices)
    TimelineActivityLog,
}

impl StreamKind {
    /// Subscription type used on the wire
    pub fn subscription_type(&self) -> &'static str {
        match self {
            StreamKind::TimelineTransactions => "timelineTransactions",
            StreamKind::TimelineActivityLog => "timelineActivityLog",
        }
    }

    /// Value written to an event's `source` field
    pub fn source_tag(&self) -> &'static str {
        match self {
            StreamKind::TimelineTransactions => "timelineTransaction",
            StreamKind::TimelineActivityLog => "timelineActivity",
        }
    }

    /// The stream walked after this one, if any
    pub fn next(&self) -> Option<StreamKind> {
        match self {
            StreamKind::TimelineTransactions => Some(StreamKind::TimelineActivityLog),
            StreamKind::TimelineActivityLog => None,
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.subscription_type())
    }
}

/// An action attached to an event, section, row or document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Action type (e.g. "timelineDetail", "instrumentDetail", "browserModal")
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Action payload (event id, ISIN, document URL...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Action {
    /// Payload as a string, when it is one
    pub fn payload_str(&self) -> Option<&str> {
        self.payload.as_ref().and_then(Value::as_str)
    }
}

/// Monetary amount as delivered in event envelopes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    /// ISO currency code
    #[serde(default)]
    pub currency: String,
    /// Signed value
    pub value: f64,
    /// Number of fraction digits to display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraction_digits: Option<u32>,
}

/// One item of a timeline stream, enriched with its details once resolved
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Event id (identity)
    pub id: EventId,
    /// Event time in milliseconds since the unix epoch
    #[serde(with = "timestamp_millis")]
    pub timestamp: i64,
    /// Event type tag (e.g. "PAYMENT_INBOUND", "card_successful_transaction")
    #[serde(default)]
    pub event_type: String,
    /// Headline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Secondary line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Action descriptor pointing at the detail view
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Label of the action, present on some events without an action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    /// Envelope amount; a partial or null amount reads as absent
    #[serde(
        default,
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub amount: Option<Amount>,
    /// Envelope status (e.g. "EXECUTED", "CANCELED")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Icon path (e.g. "logos/DE0007164600/v2")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Stream the event was first seen on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Resolved detail payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<DetailPayload>,
    /// Fields this crate does not interpret, kept for the JSON export
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TimelineEvent {
    /// Title or empty string
    pub fn title_or_empty(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// Subtitle or empty string
    pub fn subtitle_or_empty(&self) -> &str {
        self.subtitle.as_deref().unwrap_or_default()
    }

    /// Whether the detail payload has been attached
    pub fn is_resolved(&self) -> bool {
        self.details.is_some()
    }
}

/// Continuation cursors of a page
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursors {
    /// Cursor for older items; absent when the stream is exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Cursor for newer items (unused)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

/// One page of a timeline stream, newest item first
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TimelinePage {
    /// Items of this page; may be absent or null
    #[serde(default, deserialize_with = "null_as_default")]
    pub items: Vec<TimelineEvent>,
    /// Continuation cursors; may be absent or null
    #[serde(default, deserialize_with = "null_as_default")]
    pub cursors: Cursors,
}

impl TimelinePage {
    /// Timestamp of the oldest item on the page
    pub fn oldest_timestamp(&self) -> Option<i64> {
        self.items.last().map(|item| item.timestamp)
    }
}

/// Fully resolved detail record of one event
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetailPayload {
    /// Id of the event this payload belongs to
    pub id: EventId,
    /// Titled sections; anything but a list reads as no sections
    #[serde(default, deserialize_with = "lenient_sections")]
    pub sections: Vec<Section>,
}

/// A titled section of a detail payload
///
/// The typed view in [`kind`](Section::kind) is derived leniently: a section
/// whose data does not have the expected shape becomes
/// [`SectionKind::Unknown`]. The original JSON is kept and re-emitted on
/// serialization.
#[derive(Clone, Debug)]
pub struct Section {
    /// Section title (may be empty)
    pub title: String,
    /// Typed view of the section
    pub kind: SectionKind,
    /// Section-level action (e.g. `instrumentDetail` on a header)
    pub action: Option<Action>,
    raw: Value,
}

/// Section variants this crate understands
#[derive(Clone, Debug, PartialEq)]
pub enum SectionKind {
    /// Header with icon and status
    Header {
        /// Icon path
        icon: Option<String>,
        /// Status text
        status: Option<String>,
    },
    /// Key/value overview rows ("table" and "horizontalTable")
    Overview(Vec<OverviewRow>),
    /// Attached documents
    Documents(Vec<DocumentRef>),
    /// Action buttons
    ActionButtons(Vec<Action>),
    /// Anything else, with its type tag
    Unknown(String),
}

/// One row of an overview section
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverviewRow {
    /// Row label
    pub title: String,
    /// Display text of the row value
    pub text: Option<String>,
    /// Icon of the row value
    pub icon: Option<String>,
    /// Action of the row or its value
    pub action: Option<Action>,
}

/// A document referenced by a detail payload
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    /// Document id
    pub id: String,
    /// Document title
    pub title: String,
    /// Human-readable date as shown in the app
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_date: Option<String>,
    /// Download URL (may carry a signed query string)
    pub url: String,
    /// Postbox category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postbox_type: Option<String>,
}

impl Section {
    /// Build a section from its JSON form; never fails
    pub fn from_value(raw: Value) -> Self {
        let title = str_field(&raw, "title").unwrap_or_default().to_string();
        let action = raw.get("action").and_then(parse_action);
        let section_type = str_field(&raw, "type").unwrap_or_default();
        let data = raw.get("data");

        let kind = match (section_type, data) {
            ("header", data) => SectionKind::Header {
                icon: data.and_then(|d| str_field(d, "icon")).map(String::from),
                status: data.and_then(|d| str_field(d, "status")).map(String::from),
            },
            ("table" | "horizontalTable", Some(Value::Array(rows))) => {
                SectionKind::Overview(rows.iter().map(OverviewRow::from_value).collect())
            }
            ("documents", Some(Value::Array(docs))) => {
                SectionKind::Documents(docs.iter().filter_map(DocumentRef::from_value).collect())
            }
            ("actionButtons", Some(Value::Array(buttons))) => SectionKind::ActionButtons(
                buttons
                    .iter()
                    .filter_map(|b| parse_action(b.get("action").unwrap_or(b)))
                    .collect(),
            ),
            (other, _) => SectionKind::Unknown(other.to_string()),
        };

        Self {
            title,
            kind,
            action,
            raw,
        }
    }

    /// The original JSON of this section
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl OverviewRow {
    fn from_value(raw: &Value) -> Self {
        let detail = raw.get("detail");
        let text = detail
            .and_then(|d| str_field(d, "text").or_else(|| str_field(d, "value")))
            .or_else(|| detail.and_then(Value::as_str))
            .map(String::from);
        let action = raw
            .get("action")
            .or_else(|| detail.and_then(|d| d.get("action")))
            .and_then(parse_action);
        Self {
            title: str_field(raw, "title").unwrap_or_default().to_string(),
            text,
            icon: detail.and_then(|d| str_field(d, "icon")).map(String::from),
            action,
        }
    }
}

impl DocumentRef {
    fn from_value(raw: &Value) -> Option<Self> {
        let url = raw.get("action").and_then(|a| str_field(a, "payload"))?;
        Some(Self {
            id: str_field(raw, "id").unwrap_or_default().to_string(),
            title: str_field(raw, "title").unwrap_or_default().to_string(),
            display_date: str_field(raw, "detail").map(String::from),
            url: url.to_string(),
            postbox_type: str_field(raw, "postboxType").map(String::from),
        })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<Amount>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(Amount::deserialize(raw).ok())
}

fn lenient_sections<'de, D>(deserializer: D) -> Result<Vec<Section>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(sections) => sections.into_iter().map(Section::from_value).collect(),
        _ => Vec::new(),
    })
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn parse_action(value: &Value) -> Option<Action> {
    Action::deserialize(value).ok()
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Section {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Section::from_value)
    }
}

/// A row of one of the tabular exports
#[derive(Clone, Debug, PartialEq)]
pub enum ExportRow {
    /// Account movement (payments, interest, transfers)
    Payment(PaymentRow),
    /// SEPA direct debit
    DirectDebit(DirectDebitRow),
    /// Card transaction or verification
    Card(CardRow),
}

/// Row of `account_transactions.csv`
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentRow {
    /// Booking date (YYYY-MM-DD)
    pub date: String,
    /// Transaction type label
    pub kind: String,
    /// Signed value
    pub value: f64,
    /// Free-text note (counterparty, reference)
    pub note: String,
    /// Instrument ISIN, when the movement relates to one
    pub isin: String,
}

/// Row of `direct_debit.csv`
#[derive(Clone, Debug, PartialEq)]
pub struct DirectDebitRow {
    /// Booking date (YYYY-MM-DD)
    pub date: String,
    /// Creditor name
    pub creditor: String,
    /// Signed value
    pub value: f64,
    /// Mandate reference
    pub mandate: String,
    /// Free-text note
    pub note: String,
}

/// Row of `card_transactions.csv`
#[derive(Clone, Debug, PartialEq)]
pub struct CardRow {
    /// Transaction date (YYYY-MM-DD)
    pub date: String,
    /// Merchant
    pub merchant: String,
    /// Signed value
    pub value: f64,
    /// ISO currency code
    pub currency: String,
    /// Status (e.g. "EXECUTED", "verification")
    pub status: String,
}

/// A document the classifier wants downloaded
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentRequest {
    /// URL to fetch (as delivered, including query string)
    pub url: String,
    /// Destination path
    pub destination: PathBuf,
}

/// Progress notifications published by a pipeline run
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// A page of a stream was received
    PageReceived {
        /// Stream the page belongs to
        stream: StreamKind,
        /// 1-based page number within the stream
        page: usize,
        /// Items on the page
        items: usize,
    },
    /// A detail payload was received and classified
    DetailResolved {
        /// Event id
        id: EventId,
        /// Details received so far
        received: usize,
        /// Details expected in total
        total: usize,
        /// Classifier summary line
        summary: String,
    },
    /// Export artifacts were written
    ExportsWritten {
        /// Files written
        files: Vec<PathBuf>,
    },
    /// A document was downloaded and recorded in history
    DocumentDownloaded {
        /// Destination path
        path: PathBuf,
        /// Documents completed so far
        done: usize,
        /// Documents scheduled in total
        total: usize,
    },
    /// The run finished successfully
    Finished {
        /// Documents downloaded in this run
        downloaded: usize,
    },
}

/// Accepts integer milliseconds or an ISO-8601 timestamp, emits milliseconds.
pub(crate) mod timestamp_millis {
    use chrono::DateTime;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(millis: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(*millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp {n}"))),
            Value::String(s) => parse_iso(&s)
                .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{s}'"))),
            other => Err(D::Error::custom(format!("invalid timestamp {other}"))),
        }
    }

    pub(crate) fn parse_iso(s: &str) -> Option<i64> {
        DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok()
            .map(|dt| dt.timestamp_millis())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_accepts_integer_and_iso_timestamps() {
        let a: TimelineEvent =
            serde_json::from_value(json!({"id": "a", "timestamp": 1_700_000_000_000_i64}))
                .unwrap();
        assert_eq!(a.timestamp, 1_700_000_000_000);

        let b: TimelineEvent = serde_json::from_value(
            json!({"id": "b", "timestamp": "2023-11-14T22:13:20.000+0000"}),
        )
        .unwrap();
        assert_eq!(b.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn unknown_event_fields_survive_round_trip() {
        let event: TimelineEvent = serde_json::from_value(json!({
            "id": "a",
            "timestamp": 1,
            "eventType": "PAYMENT_INBOUND",
            "cashAccountNumber": "DE123",
        }))
        .unwrap();
        let back = serde_json::to_value(&event).unwrap();
        assert_eq!(back["cashAccountNumber"], "DE123");
        assert_eq!(back["eventType"], "PAYMENT_INBOUND");
    }

    #[test]
    fn page_without_items_or_cursors_is_empty() {
        let page: TimelinePage = serde_json::from_value(json!({})).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.cursors.after, None);
        assert_eq!(page.oldest_timestamp(), None);
    }

    #[test]
    fn null_items_and_cursors_read_as_empty() {
        let page: TimelinePage =
            serde_json::from_value(json!({"items": null, "cursors": null})).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.cursors, Cursors::default());
    }

    #[test]
    fn partial_amount_reads_as_absent() {
        let page: TimelinePage = serde_json::from_value(json!({"items": [
            {"id": "a", "timestamp": 1, "amount": {"currency": "EUR"}},
            {"id": "b", "timestamp": 2, "amount": null},
            {"id": "c", "timestamp": 3, "amount": {"currency": "EUR", "value": -4.5}},
        ]}))
        .unwrap();

        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].amount, None);
        assert_eq!(page.items[1].amount, None);
        assert_eq!(page.items[2].amount.as_ref().map(|a| a.value), Some(-4.5));
    }

    #[test]
    fn unusable_sections_read_as_none() {
        for sections in [json!(null), json!("oops"), json!({"type": "header"})] {
            let payload: DetailPayload =
                serde_json::from_value(json!({"id": "a", "sections": sections})).unwrap();
            assert!(payload.sections.is_empty());
        }
    }

    #[test]
    fn sections_are_typed_leniently() {
        let payload: DetailPayload = serde_json::from_value(json!({
            "id": "evt",
            "sections": [
                {"type": "header", "title": "You bought", "data": {"icon": "logos/US0378331005/v2"},
                 "action": {"type": "instrumentDetail", "payload": "US0378331005"}},
                {"type": "table", "title": "Overview", "data": [
                    {"title": "Status", "detail": {"text": "Executed", "type": "status"}},
                ]},
                {"type": "documents", "title": "Documents", "data": [
                    {"id": "d1", "title": "Invoice", "detail": "01.02.2024",
                     "action": {"type": "browserModal", "payload": "https://x/doc.pdf?sig=1"},
                     "postboxType": "INVOICE"},
                    {"id": "broken", "title": "No action"},
                ]},
                {"type": "table", "title": "Malformed", "data": "not-a-list"},
                {"type": "steps", "title": "Progress", "data": []},
            ],
        }))
        .unwrap();

        assert_eq!(payload.sections.len(), 5);
        assert!(matches!(payload.sections[0].kind, SectionKind::Header { .. }));
        assert_eq!(
            payload.sections[0].action.as_ref().unwrap().payload_str(),
            Some("US0378331005")
        );
        match &payload.sections[1].kind {
            SectionKind::Overview(rows) => assert_eq!(rows[0].text.as_deref(), Some("Executed")),
            other => panic!("Expected overview, got {other:?}"),
        }
        match &payload.sections[2].kind {
            SectionKind::Documents(docs) => {
                assert_eq!(docs.len(), 1, "documents without an URL are dropped");
                assert_eq!(docs[0].display_date.as_deref(), Some("01.02.2024"));
                assert_eq!(docs[0].postbox_type.as_deref(), Some("INVOICE"));
            }
            other => panic!("Expected documents, got {other:?}"),
        }
        assert_eq!(payload.sections[3].kind, SectionKind::Unknown("table".into()));
        assert_eq!(payload.sections[4].kind, SectionKind::Unknown("steps".into()));
    }

    #[test]
    fn section_serializes_back_to_original_json() {
        let raw = json!({"type": "steps", "title": "Progress", "data": [{"x": 1}]});
        let section = Section::from_value(raw.clone());
        assert_eq!(serde_json::to_value(&section).unwrap(), raw);
    }

    #[test]
    fn stream_order_is_transactions_then_activity() {
        assert_eq!(
            StreamKind::TimelineTransactions.next(),
            Some(StreamKind::TimelineActivityLog)
        );
        assert_eq!(StreamKind::TimelineActivityLog.next(), None);
    }
}
