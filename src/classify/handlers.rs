//! Built-in event handlers.

use super::sections::{self, amount, isin, overview_value};
use super::{ClassifyContext, Classification, EventHandler};
use crate::types::{
    CardRow, DirectDebitRow, DocumentRequest, ExportRow, PaymentRow, TimelineEvent,
};
use crate::utils::{
    FilenameVars, document_extension, iso_date, parse_display_date, render_filename,
    timestamp_to_datetime,
};
use std::collections::HashMap;
use std::path::PathBuf;

/// `label: title -- subtitle (value currency)`
fn summary_line(label: &str, event: &TimelineEvent) -> String {
    let mut line = format!("{label}: {}", event.title_or_empty());
    if let Some(subtitle) = event.subtitle.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(" -- ");
        line.push_str(subtitle);
    }
    if let Some((value, currency)) = amount(event) {
        line.push_str(&format!(" ({value:.2} {currency})"));
    }
    line
}

/// Download requests for every document of `event`, placed under `folder`
fn document_requests(
    event: &TimelineEvent,
    ctx: &ClassifyContext,
    folder: &str,
) -> Vec<DocumentRequest> {
    let docs = sections::documents(event);

    let mut title_counts: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        *title_counts.entry(doc.title.as_str()).or_default() += 1;
    }

    let event_time = timestamp_to_datetime(event.timestamp);
    let event_date = event_time.map(|dt| dt.date_naive());
    let mut seen: HashMap<&str, usize> = HashMap::new();

    docs.into_iter()
        .map(|doc| {
            let doc_date = doc
                .display_date
                .as_deref()
                .and_then(parse_display_date)
                .or(event_date);
            let date = doc_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| iso_date(event.timestamp));
            let time = match event_time {
                Some(dt) if doc_date == event_date => dt.format(" %H-%M").to_string(),
                _ => String::new(),
            };
            let doc_num = if title_counts.get(doc.title.as_str()).copied().unwrap_or(0) > 1 {
                let n = seen.entry(doc.title.as_str()).or_default();
                *n += 1;
                format!(" ({n})")
            } else {
                String::new()
            };

            let vars = FilenameVars {
                iso_date: &date,
                time: &time,
                title: &doc.title,
                doc_num: &doc_num,
                subtitle: event.subtitle_or_empty(),
                id: &doc.id,
            };
            let mut name = render_filename(&ctx.filename_format, &vars, ctx.universal).into_os_string();
            name.push(document_extension(&doc.url));

            DocumentRequest {
                url: doc.url.clone(),
                destination: ctx.output_dir.join(folder).join(PathBuf::from(name)),
            }
        })
        .collect()
}

/// Downloads attached documents into one folder
#[derive(Clone, Debug)]
pub struct DocumentHandler {
    folder: &'static str,
    label: &'static str,
}

impl DocumentHandler {
    /// Handler placing documents under `folder`, summarising as `label`
    pub fn new(folder: &'static str, label: &'static str) -> Self {
        Self { folder, label }
    }
}

impl EventHandler for DocumentHandler {
    fn classify(&self, event: &TimelineEvent, ctx: &ClassifyContext) -> Classification {
        Classification {
            summary: summary_line(self.label, event),
            documents: document_requests(event, ctx, self.folder),
            rows: Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        "documents"
    }
}

/// Account movements: one `account_transactions.csv` row plus documents
#[derive(Clone, Debug)]
pub struct PaymentHandler {
    folder: &'static str,
    label: &'static str,
    kind: Option<&'static str>,
}

impl PaymentHandler {
    /// Handler writing rows of type `kind`; with `None` the type follows the
    /// sign of the value ("Deposit" or "Removal")
    pub fn new(folder: &'static str, label: &'static str, kind: Option<&'static str>) -> Self {
        Self { folder, label, kind }
    }
}

impl EventHandler for PaymentHandler {
    fn classify(&self, event: &TimelineEvent, ctx: &ClassifyContext) -> Classification {
        let mut rows = Vec::new();
        match amount(event) {
            Some((value, _)) => {
                let kind = self.kind.unwrap_or(if value < 0.0 { "Removal" } else { "Deposit" });
                let note = overview_value(event, &["Reference", "Verwendungszweck", "Note", "Notiz"])
                    .unwrap_or(event.title_or_empty());
                rows.push(ExportRow::Payment(PaymentRow {
                    date: iso_date(event.timestamp),
                    kind: kind.to_string(),
                    value,
                    note: note.to_string(),
                    isin: isin(event).unwrap_or_default(),
                }));
            }
            None => tracing::debug!(id = %event.id, "No amount found, no transaction row"),
        }

        Classification {
            summary: summary_line(self.label, event),
            documents: document_requests(event, ctx, self.folder),
            rows,
        }
    }

    fn name(&self) -> &'static str {
        "payment"
    }
}

/// SEPA direct debits: one `direct_debit.csv` row plus documents under `Payments/`
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectDebitHandler;

impl EventHandler for DirectDebitHandler {
    fn classify(&self, event: &TimelineEvent, ctx: &ClassifyContext) -> Classification {
        let mut rows = Vec::new();
        match amount(event) {
            Some((value, _)) => {
                let creditor = overview_value(event, &["Creditor", "Gläubiger", "Empfänger"])
                    .unwrap_or(event.title_or_empty());
                let mandate =
                    overview_value(event, &["Mandate", "Mandate reference", "Mandatsreferenz"])
                        .unwrap_or_default();
                rows.push(ExportRow::DirectDebit(DirectDebitRow {
                    date: iso_date(event.timestamp),
                    creditor: creditor.to_string(),
                    value,
                    mandate: mandate.to_string(),
                    note: event.subtitle_or_empty().to_string(),
                }));
            }
            None => tracing::debug!(id = %event.id, "No amount found, no direct debit row"),
        }

        Classification {
            summary: summary_line("Direct debit", event),
            documents: document_requests(event, ctx, "Payments"),
            rows,
        }
    }

    fn name(&self) -> &'static str {
        "direct_debit"
    }
}

/// Card transactions and verifications: one `card_transactions.csv` row, no documents
#[derive(Clone, Copy, Debug)]
pub struct CardHandler {
    verification: bool,
}

impl CardHandler {
    /// Handler for payments, refunds and withdrawals
    pub fn transaction() -> Self {
        Self {
            verification: false,
        }
    }

    /// Handler for card verifications
    pub fn verification() -> Self {
        Self { verification: true }
    }
}

impl EventHandler for CardHandler {
    fn classify(&self, event: &TimelineEvent, _ctx: &ClassifyContext) -> Classification {
        let (value, currency) = amount(event).unwrap_or((0.0, String::new()));
        let status = if self.verification {
            "verification".to_string()
        } else {
            event.status.clone().unwrap_or_default()
        };

        Classification {
            summary: summary_line("Card", event),
            documents: Vec::new(),
            rows: vec![ExportRow::Card(CardRow {
                date: iso_date(event.timestamp),
                merchant: event.title_or_empty().to_string(),
                value,
                currency,
                status,
            })],
        }
    }

    fn name(&self) -> &'static str {
        "card"
    }
}

/// Dividend reinvestments: documents only, no export row
#[derive(Clone, Copy, Debug, Default)]
pub struct ReinvestmentHandler;

impl EventHandler for ReinvestmentHandler {
    fn classify(&self, event: &TimelineEvent, ctx: &ClassifyContext) -> Classification {
        tracing::warn!(id = %event.id, "Reinvestment is not supported in the transaction export, skipping row");
        Classification {
            summary: summary_line("Reinvestment", event),
            documents: document_requests(event, ctx, "Reinvestment"),
            rows: Vec::new(),
        }
    }

    fn name(&self) -> &'static str {
        "reinvestment"
    }
}
