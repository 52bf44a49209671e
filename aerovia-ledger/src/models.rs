use aerovia_shared::{SeatClass, TicketRef};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Passenger details captured at booking time and retained on the ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub dni: String,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: NaiveDate,
    pub email: Option<String>,
}

impl Passenger {
    pub fn age_on(&self, date: NaiveDate) -> u32 {
        date.years_since(self.birth_date).unwrap_or(0)
    }

    pub fn is_adult_on(&self, date: NaiveDate) -> bool {
        self.age_on(date) >= 18
    }
}

/// Settlement state of a ticket. The purchase linkage lives inside the
/// variant, so "unpurchased" is a state of its own rather than a zero id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketState {
    Reserved,
    Purchased { purchase_id: Uuid },
    Cancelled,
}

/// A ticket: one passenger on one flight, holding exactly one occupied
/// seat while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub flight_code: String,
    pub passenger: Passenger,
    pub username: String,
    pub seat_class: SeatClass,
    pub seat_number: u32,
    pub price: i64,
    pub state: TicketState,
    pub created_at: DateTime<Utc>,
    pub checked_in: Option<DateTime<Utc>>,
    pub seat_changed: bool,
}

impl Ticket {
    pub fn ticket_ref(&self) -> TicketRef {
        TicketRef::new(self.flight_code.clone(), self.passenger.dni.clone())
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, TicketState::Cancelled)
    }

    pub fn purchase_id(&self) -> Option<Uuid> {
        match self.state {
            TicketState::Purchased { purchase_id } => Some(purchase_id),
            _ => None,
        }
    }
}

/// What a refund owes and to which purchase it belongs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundDue {
    pub purchase_id: Uuid,
    pub amount: i64,
}

/// Result of cancelling a single ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelledTicket {
    pub ticket_ref: TicketRef,
    pub seat_number: u32,
    /// Present when the ticket was purchased; pure reservations owe nothing.
    pub refund: Option<RefundDue>,
}

/// Per-ticket outcome of a flight-wide cancellation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketOutcome {
    Cancelled {
        ticket_ref: TicketRef,
        refund_due: i64,
    },
    ReservationDropped {
        ticket_ref: TicketRef,
    },
    Failed {
        ticket_ref: TicketRef,
        reason: String,
    },
}

/// Structured result of cascading a flight cancellation over its tickets.
/// Failed entries are reported instead of being collapsed away, so the
/// orchestrator can retry or alert on the exact tickets left behind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightCancellationReport {
    pub flight_code: String,
    pub outcomes: Vec<TicketOutcome>,
    pub refunds_by_purchase: BTreeMap<Uuid, i64>,
    pub affected_users: BTreeSet<String>,
}

impl FlightCancellationReport {
    pub fn new(flight_code: impl Into<String>) -> Self {
        Self {
            flight_code: flight_code.into(),
            outcomes: Vec::new(),
            refunds_by_purchase: BTreeMap::new(),
            affected_users: BTreeSet::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TicketOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TicketOutcome::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}
