//! Per-event-type classification of resolved events.
//!
//! Each resolved event is dispatched on its [`EventType`] to an
//! [`EventHandler`], which turns the detail payload into a summary line,
//! export rows and document download requests:
//! - [`sections`] - absence-tolerant lookups into detail payloads
//! - [`handlers`] - the built-in handlers

mod handlers;
mod sections;

pub use handlers::{CardHandler, DirectDebitHandler, DocumentHandler, PaymentHandler, ReinvestmentHandler};
pub use sections::{isin, overview_value, parse_amount};

use crate::config::Config;
use crate::types::{DocumentRequest, ExportRow, TimelineEvent};
use std::collections::HashMap;
use std::path::PathBuf;

/// Closed set of event categories with dedicated handling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Buy/sell order executions and trade invoices
    Trade,
    /// Savings plan executions
    SavingsPlan,
    /// Saveback and round-up executions
    Saveback,
    /// Dividend and corporate action cash payouts
    Dividend,
    /// Interest payouts
    Interest,
    /// Incoming and outgoing transfers
    Payment,
    /// SEPA direct debits
    DirectDebit,
    /// Card payments, refunds and withdrawals
    CardTransaction,
    /// Card verifications
    CardVerification,
    /// Tax refunds and corrections
    Tax,
    /// Statements and periodic reports
    Report,
    /// Dividend reinvestments
    Reinvestment,
    /// Everything else
    Other,
}

impl EventType {
    /// Map an `eventType` tag, ignoring case; unknown tags become [`EventType::Other`]
    pub fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "order_executed" | "trade_invoice" | "trade_corrected" | "trading_trade_executed" => {
                EventType::Trade
            }
            "savings_plan_executed"
            | "savings_plan_invoice_created"
            | "trading_savingsplan_executed"
            | "benefits_savings_plan_execution" => EventType::SavingsPlan,
            "benefits_saveback_execution" | "benefits_spare_change_execution" => {
                EventType::Saveback
            }
            "credit" | "ssp_corporate_action_invoice_cash" => EventType::Dividend,
            "interest_payout" | "interest_payout_created" => EventType::Interest,
            "payment_inbound_sepa_direct_debit"
            | "payment_outbound_sepa_direct_debit"
            | "direct_debit" => EventType::DirectDebit,
            "payment_inbound"
            | "payment_outbound"
            | "payment_inbound_google_pay"
            | "payment_inbound_apple_pay"
            | "payment_inbound_credit_card"
            | "incoming_transfer"
            | "outgoing_transfer"
            | "incoming_transfer_delegation"
            | "outgoing_transfer_delegation" => EventType::Payment,
            "card_successful_transaction"
            | "card_failed_transaction"
            | "card_refund"
            | "card_successful_atm_withdrawal" => EventType::CardTransaction,
            "card_verification" | "card_successful_verification" => EventType::CardVerification,
            "tax_refund" | "ssp_tax_correction_invoice" => EventType::Tax,
            "documents_created" | "year_end_tax_report" | "quarterly_report"
            | "account_statement" => EventType::Report,
            "ssp_dividend_reinvestment" | "ssp_dividend_reinvestment_cash" => {
                EventType::Reinvestment
            }
            _ => EventType::Other,
        }
    }
}

/// Settings handlers need to name documents
#[derive(Clone, Debug)]
pub struct ClassifyContext {
    /// Output root; handlers place documents in folders below it
    pub output_dir: PathBuf,
    /// File name template
    pub filename_format: String,
    /// Produce names valid on every major filesystem
    pub universal: bool,
}

impl ClassifyContext {
    /// Context for the given run configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            filename_format: config.filename_format.clone(),
            universal: config.download.universal_filepath,
        }
    }
}

/// What a handler extracted from one event
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    /// One-line description for progress output
    pub summary: String,
    /// Documents to download
    pub documents: Vec<DocumentRequest>,
    /// Rows for the tabular exports
    pub rows: Vec<ExportRow>,
}

/// Turns one resolved event into a [`Classification`]
///
/// Implementations must tolerate missing sections and fields: absent data
/// yields empty values, never a failure.
pub trait EventHandler: Send + Sync {
    /// Classify `event` (its `details` may be absent)
    fn classify(&self, event: &TimelineEvent, ctx: &ClassifyContext) -> Classification;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Dispatch table from [`EventType`] to [`EventHandler`]
pub struct Classifier {
    handlers: HashMap<EventType, Box<dyn EventHandler>>,
    fallback: Box<dyn EventHandler>,
}

impl Classifier {
    /// Classifier with the built-in handler for every [`EventType`]
    pub fn new() -> Self {
        let mut handlers: HashMap<EventType, Box<dyn EventHandler>> = HashMap::new();
        handlers.insert(EventType::Trade, Box::new(DocumentHandler::new("Trades", "Trade")));
        handlers.insert(
            EventType::SavingsPlan,
            Box::new(DocumentHandler::new("Savings Plan", "Savings plan")),
        );
        handlers.insert(EventType::Saveback, Box::new(DocumentHandler::new("Saveback", "Saveback")));
        handlers.insert(
            EventType::Dividend,
            Box::new(PaymentHandler::new("Dividends", "Dividend", Some("Dividend"))),
        );
        handlers.insert(
            EventType::Interest,
            Box::new(PaymentHandler::new("Interest", "Interest", Some("Interest"))),
        );
        handlers.insert(
            EventType::Payment,
            Box::new(PaymentHandler::new("Payments", "Payment", None)),
        );
        handlers.insert(EventType::DirectDebit, Box::new(DirectDebitHandler));
        handlers.insert(EventType::CardTransaction, Box::new(CardHandler::transaction()));
        handlers.insert(EventType::CardVerification, Box::new(CardHandler::verification()));
        handlers.insert(EventType::Tax, Box::new(DocumentHandler::new("Tax", "Tax")));
        handlers.insert(EventType::Report, Box::new(DocumentHandler::new("Reports", "Report")));
        handlers.insert(EventType::Reinvestment, Box::new(ReinvestmentHandler));

        Self {
            handlers,
            fallback: Box::new(DocumentHandler::new("Other", "Event")),
        }
    }

    /// Install `handler` for `event_type`, replacing any existing one
    pub fn with_handler(mut self, event_type: EventType, handler: impl EventHandler + 'static) -> Self {
        self.handlers.insert(event_type, Box::new(handler));
        self
    }

    /// Replace the handler used for [`EventType::Other`] and unmapped types
    pub fn with_fallback(mut self, handler: impl EventHandler + 'static) -> Self {
        self.fallback = Box::new(handler);
        self
    }

    /// Dispatch `event` to its handler
    pub fn classify(&self, event: &TimelineEvent, ctx: &ClassifyContext) -> Classification {
        let event_type = EventType::from_tag(&event.event_type);
        let handler = self
            .handlers
            .get(&event_type)
            .unwrap_or(&self.fallback);
        tracing::trace!(id = %event.id, ?event_type, handler = handler.name(), "Classifying event");
        handler.classify(event, ctx)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("handlers", &self.handlers.len())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
