pub mod financial;
pub mod notify;

pub use financial::{FinancialError, FinancialGateway, PaymentReceipt};
pub use notify::{LogNotifier, Notifier, NotifyError};
