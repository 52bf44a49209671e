use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof of a captured payment, returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub card_number: String,
    pub amount: i64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum FinancialError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    #[error("card verification failed for card ending {0}")]
    CardMismatch(String),

    #[error("card not found: {0}")]
    CardNotFound(String),

    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
}

/// Seam to the payment provider. Amounts are in minor currency units.
#[async_trait]
pub trait FinancialGateway: Send + Sync {
    /// Capture `amount` against the card after verifying the cvv.
    async fn pay(
        &self,
        card_number: &str,
        cvv: &str,
        amount: i64,
    ) -> Result<PaymentReceipt, FinancialError>;

    /// Return `amount` to the card. No cvv is required for refunds.
    async fn refund(&self, card_number: &str, amount: i64) -> Result<(), FinancialError>;
}
