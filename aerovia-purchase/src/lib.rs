pub mod coordinator;
pub mod gateway;
pub mod models;

pub use coordinator::{PurchaseCoordinator, PurchaseError};
pub use gateway::MockFinancialGateway;
pub use models::{FlightCancellationSummary, Purchase, PurchaseReceipt, TicketCancellation};
