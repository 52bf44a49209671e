use aerovia_ledger::{CancelledTicket, FlightCancellationReport};
use aerovia_shared::TicketRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A settled batch of tickets. Immutable once written: refunds move money
/// back to the card but never rewrite the purchase total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub username: String,
    pub card_number: String,
    pub total: i64,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
}

/// A ticket whose linkage failed after payment capture and whose price was
/// refunded on the spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensatedTicket {
    pub ticket_ref: TicketRef,
    pub amount: i64,
    pub reason: String,
}

/// Outcome of a purchase, including any compensating refunds that were
/// issued when linkage could not be completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub purchase: Purchase,
    pub ticket_count: usize,
    pub compensated: Vec<CompensatedTicket>,
}

/// Outcome of cancelling one ticket. The ledger-side cancellation is
/// already durable by the time this is built, so a refund that could not
/// be delivered is reported here rather than surfaced as an error the
/// caller would retry into `AlreadyCancelled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketCancellation {
    pub cancelled: CancelledTicket,
    pub refund_failure: Option<RefundFailure>,
}

/// A refund that could not be delivered during a flight cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundFailure {
    pub purchase_id: Uuid,
    pub amount: i64,
    pub reason: String,
}

/// Full account of a flight cancellation: the ledger's per-ticket report
/// plus what was actually refunded and who was told.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightCancellationSummary {
    pub report: FlightCancellationReport,
    pub refunded: Vec<(Uuid, i64)>,
    pub refund_failures: Vec<RefundFailure>,
    pub notified_users: Vec<String>,
}

impl FlightCancellationSummary {
    pub fn is_clean(&self) -> bool {
        self.report.is_clean() && self.refund_failures.is_empty()
    }
}
