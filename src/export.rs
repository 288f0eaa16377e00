//! Export artifacts written once the timeline is complete.
//!
//! Rows are accumulated in memory during classification and flushed in one go;
//! a crash before the flush loses the exports but not the downloaded documents.

use crate::error::Result;
use crate::types::{CardRow, DirectDebitRow, ExportRow, PaymentRow, TimelineEvent};
use crate::utils::csv_field;
use std::path::{Path, PathBuf};

/// All accumulated events, resolved or not
pub const ALL_EVENTS_FILE: &str = "all_events.json";
/// Events with resolved details
pub const EVENTS_FILE: &str = "events.json";
/// Account movements
pub const TRANSACTIONS_FILE: &str = "account_transactions.csv";
/// SEPA direct debits
pub const DIRECT_DEBIT_FILE: &str = "direct_debit.csv";
/// Card transactions
pub const CARD_FILE: &str = "card_transactions.csv";

/// Accumulates export rows and writes the export files
#[derive(Debug)]
pub struct Exporter {
    output_dir: PathBuf,
    payments: Vec<PaymentRow>,
    direct_debits: Vec<DirectDebitRow>,
    cards: Vec<CardRow>,
}

impl Exporter {
    /// Exporter writing into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            payments: Vec::new(),
            direct_debits: Vec::new(),
            cards: Vec::new(),
        }
    }

    /// Add rows produced by the classifier
    pub fn record(&mut self, rows: impl IntoIterator<Item = ExportRow>) {
        for row in rows {
            match row {
                ExportRow::Payment(row) => self.payments.push(row),
                ExportRow::DirectDebit(row) => self.direct_debits.push(row),
                ExportRow::Card(row) => self.cards.push(row),
            }
        }
    }

    /// Number of rows recorded so far
    pub fn row_count(&self) -> usize {
        self.payments.len() + self.direct_debits.len() + self.cards.len()
    }

    /// Write every export file and return their paths
    pub async fn flush(&self, events: &[TimelineEvent]) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let resolved: Vec<&TimelineEvent> = events.iter().filter(|e| e.is_resolved()).collect();

        let mut files = Vec::with_capacity(5);
        files.push(self.write(ALL_EVENTS_FILE, serde_json::to_vec_pretty(events)?).await?);
        files.push(self.write(EVENTS_FILE, serde_json::to_vec_pretty(&resolved)?).await?);

        let payments = render_csv(
            "Date;Type;Value;Note;ISIN",
            self.payments.iter().map(|r| {
                format!(
                    "{};{};{:.2};{};{}",
                    r.date,
                    csv_field(&r.kind),
                    r.value,
                    csv_field(&r.note),
                    csv_field(&r.isin)
                )
            }),
        );
        files.push(self.write(TRANSACTIONS_FILE, payments.into_bytes()).await?);

        let direct_debits = render_csv(
            "Date;Creditor;Value;Mandate;Note",
            self.direct_debits.iter().map(|r| {
                format!(
                    "{};{};{:.2};{};{}",
                    r.date,
                    csv_field(&r.creditor),
                    r.value,
                    csv_field(&r.mandate),
                    csv_field(&r.note)
                )
            }),
        );
        files.push(self.write(DIRECT_DEBIT_FILE, direct_debits.into_bytes()).await?);

        let cards = render_csv(
            "Date;Merchant;Value;Currency;Status",
            self.cards.iter().map(|r| {
                format!(
                    "{};{};{:.2};{};{}",
                    r.date,
                    csv_field(&r.merchant),
                    r.value,
                    csv_field(&r.currency),
                    csv_field(&r.status)
                )
            }),
        );
        files.push(self.write(CARD_FILE, cards.into_bytes()).await?);

        tracing::info!(
            events = events.len(),
            resolved = resolved.len(),
            rows = self.row_count(),
            "Wrote export files"
        );
        Ok(files)
    }

    async fn write(&self, name: &str, contents: Vec<u8>) -> Result<PathBuf> {
        let path = self.output_dir.join(name);
        tokio::fs::write(&path, contents).await?;
        tracing::debug!(path = %path.display(), "Written");
        Ok(path)
    }

    /// Directory the files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

fn render_csv(header: &str, lines: impl Iterator<Item = String>) -> String {
    let mut out = String::from(header);
    out.push('\n');
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn event(id: &str, resolved: bool) -> TimelineEvent {
        let mut event: TimelineEvent =
            serde_json::from_value(json!({"id": id, "timestamp": 1})).unwrap();
        if resolved {
            event.details = Some(serde_json::from_value(json!({"id": id, "sections": []})).unwrap());
        }
        event
    }

    #[tokio::test]
    async fn flush_writes_all_files() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("nested");
        let mut exporter = Exporter::new(&out);
        exporter.record([
            ExportRow::Payment(PaymentRow {
                date: "2024-02-01".into(),
                kind: "Removal".into(),
                value: -42.5,
                note: "Rent; February".into(),
                isin: String::new(),
            }),
            ExportRow::Card(CardRow {
                date: "2024-02-02".into(),
                merchant: "Shop".into(),
                value: -9.999,
                currency: "EUR".into(),
                status: "EXECUTED".into(),
            }),
        ]);

        let files = exporter
            .flush(&[event("a", true), event("b", false)])
            .await
            .unwrap();

        assert_eq!(files.len(), 5);
        assert!(files.iter().all(|f| f.exists()));

        let transactions = std::fs::read_to_string(out.join(TRANSACTIONS_FILE)).unwrap();
        assert_eq!(
            transactions,
            "Date;Type;Value;Note;ISIN\n2024-02-01;Removal;-42.50;Rent  February;\n"
        );
        let cards = std::fs::read_to_string(out.join(CARD_FILE)).unwrap();
        assert_eq!(
            cards,
            "Date;Merchant;Value;Currency;Status\n2024-02-02;Shop;-10.00;EUR;EXECUTED\n"
        );
        let direct_debits = std::fs::read_to_string(out.join(DIRECT_DEBIT_FILE)).unwrap();
        assert_eq!(direct_debits, "Date;Creditor;Value;Mandate;Note\n");

        let all: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(out.join(ALL_EVENTS_FILE)).unwrap()).unwrap();
        let resolved: Vec<serde_json::Value> =
            serde_json::from_slice(&std::fs::read(out.join(EVENTS_FILE)).unwrap()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0]["id"], "a");
    }
}
