pub mod ledger;
pub mod models;
pub mod policy;

pub use ledger::{LedgerError, TicketLedger};
pub use models::{
    CancelledTicket, FlightCancellationReport, Passenger, RefundDue, Ticket, TicketOutcome,
    TicketState,
};
