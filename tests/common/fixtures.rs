//! JSON fixtures shaped like the account API's timeline payloads

use serde_json::{Value, json};

/// 2024-02-01T10:30:00Z in milliseconds
pub const TS: i64 = 1_706_783_400_000;

/// A timeline item pointing at its own detail view
pub fn event(id: &str, timestamp: i64, event_type: &str, title: &str) -> Value {
    json!({
        "id": id,
        "timestamp": timestamp,
        "eventType": event_type,
        "title": title,
        "action": {"type": "timelineDetail", "payload": id},
    })
}

/// A timeline item without any action (never resolved)
pub fn bare_event(id: &str, timestamp: i64) -> Value {
    json!({"id": id, "timestamp": timestamp, "eventType": "UNKNOWN", "title": "Notice"})
}

/// A page of items with an optional continuation cursor
pub fn page(items: Vec<Value>, after: Option<&str>) -> Value {
    match after {
        Some(cursor) => json!({"items": items, "cursors": {"after": cursor}}),
        None => json!({"items": items, "cursors": {}}),
    }
}

/// A detail payload with one documents section
///
/// Each document is `(title, display date, url)`.
pub fn detail_with_documents(id: &str, documents: &[(&str, &str, &str)]) -> Value {
    let data: Vec<Value> = documents
        .iter()
        .enumerate()
        .map(|(i, (title, date, url))| {
            json!({
                "id": format!("{id}-doc{i}"),
                "title": title,
                "detail": date,
                "action": {"type": "browserModal", "payload": url},
                "postboxType": "INVOICE",
            })
        })
        .collect();

    json!({
        "id": id,
        "sections": [
            {"type": "header", "title": "Header", "data": {"status": "executed"}},
            {"type": "documents", "title": "Documents", "data": data},
        ],
    })
}
