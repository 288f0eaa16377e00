//! Absence-tolerant lookups into detail payloads.

use crate::types::{Action, DocumentRef, SectionKind, TimelineEvent};
use regex::Regex;
use std::sync::LazyLock;

/// Action type whose payload is an instrument ISIN
const INSTRUMENT_ACTION: &str = "instrumentDetail";

// Pattern is a literal; compilation cannot fail at runtime
#[allow(clippy::unwrap_used)]
static ICON_ISIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"logos/([A-Z]{2}[A-Z0-9]{9}[0-9])/v2").unwrap());

/// Text of the first overview row titled like any of `keys`, ignoring case
pub fn overview_value<'a>(event: &'a TimelineEvent, keys: &[&str]) -> Option<&'a str> {
    let details = event.details.as_ref()?;
    details
        .sections
        .iter()
        .filter_map(|s| match &s.kind {
            SectionKind::Overview(rows) => Some(rows),
            _ => None,
        })
        .flatten()
        .find(|row| keys.iter().any(|k| row.title.eq_ignore_ascii_case(k)))
        .and_then(|row| row.text.as_deref())
        .filter(|text| !text.is_empty())
}

/// Every document referenced by the event's detail payload
pub fn documents(event: &TimelineEvent) -> Vec<&DocumentRef> {
    let Some(details) = event.details.as_ref() else {
        return Vec::new();
    };
    details
        .sections
        .iter()
        .filter_map(|s| match &s.kind {
            SectionKind::Documents(docs) => Some(docs),
            _ => None,
        })
        .flatten()
        .collect()
}

/// ISIN of the instrument an event relates to
///
/// Taken from an `instrumentDetail` action anywhere in the sections, else
/// matched from an icon path of the form `logos/{ISIN}/v2`.
pub fn isin(event: &TimelineEvent) -> Option<String> {
    let sections = event.details.as_ref().map(|d| d.sections.as_slice()).unwrap_or_default();

    let from_action = sections.iter().find_map(|section| {
        let row_actions: Vec<&Action> = match &section.kind {
            SectionKind::Overview(rows) => rows.iter().filter_map(|r| r.action.as_ref()).collect(),
            SectionKind::ActionButtons(actions) => actions.iter().collect(),
            _ => Vec::new(),
        };
        section
            .action
            .iter()
            .chain(row_actions)
            .filter(|a| a.kind == INSTRUMENT_ACTION)
            .find_map(|a| a.payload_str())
            .map(String::from)
    });
    if from_action.is_some() {
        return from_action;
    }

    let section_icons = sections.iter().flat_map(|section| -> Vec<Option<&str>> {
        match &section.kind {
            SectionKind::Header { icon, .. } => vec![icon.as_deref()],
            SectionKind::Overview(rows) => rows.iter().map(|r| r.icon.as_deref()).collect(),
            _ => Vec::new(),
        }
    });
    std::iter::once(event.icon.as_deref())
        .chain(section_icons)
        .flatten()
        .find_map(|icon| ICON_ISIN.captures(icon))
        .map(|caps| caps[1].to_string())
}

/// Signed value and currency of an event
///
/// Prefers the envelope amount; falls back to the overview rows.
pub fn amount(event: &TimelineEvent) -> Option<(f64, String)> {
    if let Some(amount) = &event.amount {
        return Some((amount.value, amount.currency.clone()));
    }
    let text = overview_value(event, &["Total", "Gesamt", "Amount", "Betrag", "Summe"])?;
    let (value, currency) = parse_amount(text)?;
    Some((value, currency.unwrap_or_default()))
}

/// Parse a displayed amount like "1.234,56 €", "-€12.50" or "CHF 3'000.00"
///
/// Returns the value and the currency code when one is recognisable.
pub fn parse_amount(text: &str) -> Option<(f64, Option<String>)> {
    let mut currency = None;
    let mut rest = text.trim().to_string();
    for (symbol, code) in [("€", "EUR"), ("$", "USD"), ("£", "GBP")] {
        if rest.contains(symbol) {
            currency = Some(code.to_string());
            rest = rest.replace(symbol, "");
        }
    }
    for code in ["EUR", "USD", "GBP", "CHF"] {
        if rest.contains(code) {
            currency = Some(code.to_string());
            rest = rest.replace(code, "");
        }
    }

    let negative = rest.contains(['-', '−']);
    let digits: String = rest
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    // The separator occurring last is the decimal separator
    let normalized = match (digits.rfind(','), digits.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (Some(_), None) => digits.replace(',', "."),
        _ => digits,
    };

    let value: f64 = normalized.parse().ok()?;
    Some((if negative { -value } else { value }, currency))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolved(details: serde_json::Value) -> TimelineEvent {
        let mut event: TimelineEvent =
            serde_json::from_value(json!({"id": "evt", "timestamp": 0})).unwrap();
        event.details = Some(serde_json::from_value(details).unwrap());
        event
    }

    #[test]
    fn parse_amount_handles_both_conventions() {
        assert_eq!(parse_amount("1.234,56 €"), Some((1234.56, Some("EUR".into()))));
        assert_eq!(parse_amount("-€12.50"), Some((-12.5, Some("EUR".into()))));
        assert_eq!(parse_amount("$1,234.56"), Some((1234.56, Some("USD".into()))));
        assert_eq!(parse_amount("CHF 3000.00"), Some((3000.0, Some("CHF".into()))));
        assert_eq!(parse_amount("12"), Some((12.0, None)));
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn isin_prefers_instrument_action() {
        let event = resolved(json!({
            "id": "evt",
            "sections": [
                {"type": "header", "title": "Bought", "data": {"icon": "logos/US0378331005/v2"}},
                {"type": "table", "title": "Overview", "data": [
                    {"title": "Asset", "detail": {"text": "Siemens",
                     "action": {"type": "instrumentDetail", "payload": "DE0007236101"}}},
                ]},
            ],
        }));
        assert_eq!(isin(&event).as_deref(), Some("DE0007236101"));
    }

    #[test]
    fn isin_falls_back_to_icon_path() {
        let mut event = resolved(json!({"id": "evt", "sections": []}));
        assert_eq!(isin(&event), None);

        event.icon = Some("logos/IE00B4L5Y983/v2".into());
        assert_eq!(isin(&event).as_deref(), Some("IE00B4L5Y983"));

        event.icon = Some("logos/merchant-icon/v2".into());
        assert_eq!(isin(&event), None);
    }

    #[test]
    fn lookups_tolerate_missing_details() {
        let event: TimelineEvent =
            serde_json::from_value(json!({"id": "evt", "timestamp": 0})).unwrap();
        assert!(overview_value(&event, &["Total"]).is_none());
        assert!(documents(&event).is_empty());
        assert!(amount(&event).is_none());
    }

    #[test]
    fn value_lookup_is_case_insensitive() {
        let event = resolved(json!({
            "id": "evt",
            "sections": [
                {"type": "table", "title": "Transaction overview", "data": [
                    {"title": "TOTAL", "detail": {"text": "-25,00 €"}},
                ]},
            ],
        }));
        assert_eq!(overview_value(&event, &["Total"]), Some("-25,00 €"));
        assert_eq!(amount(&event), Some((-25.0, "EUR".to_string())));
    }
}
