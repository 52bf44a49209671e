use aerovia_core::{FinancialError, FinancialGateway, PaymentReceipt};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct CardAccount {
    cvv: String,
    balance: i64,
}

/// In-memory financial gateway for tests and local wiring. Cards are
/// registered with a cvv and a balance; pay debits, refund credits.
pub struct MockFinancialGateway {
    cards: Mutex<HashMap<String, CardAccount>>,
}

impl MockFinancialGateway {
    pub fn new() -> Self {
        Self {
            cards: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_card(self, number: &str, cvv: &str, balance: i64) -> Self {
        self.lock().insert(
            number.to_string(),
            CardAccount {
                cvv: cvv.to_string(),
                balance,
            },
        );
        self
    }

    pub fn balance(&self, number: &str) -> Option<i64> {
        self.lock().get(number).map(|card| card.balance)
    }

    /// Forget a card, making later pay/refund attempts against it fail.
    pub fn drop_card(&self, number: &str) {
        self.lock().remove(number);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CardAccount>> {
        self.cards.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn last_four(number: &str) -> String {
        number.chars().rev().take(4).collect::<String>().chars().rev().collect()
    }
}

impl Default for MockFinancialGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FinancialGateway for MockFinancialGateway {
    async fn pay(
        &self,
        card_number: &str,
        cvv: &str,
        amount: i64,
    ) -> Result<PaymentReceipt, FinancialError> {
        let mut cards = self.lock();
        let card = cards
            .get_mut(card_number)
            .ok_or_else(|| FinancialError::CardNotFound(Self::last_four(card_number)))?;
        if card.cvv != cvv {
            return Err(FinancialError::CardMismatch(Self::last_four(card_number)));
        }
        if card.balance < amount {
            return Err(FinancialError::InsufficientFunds {
                requested: amount,
                available: card.balance,
            });
        }
        card.balance -= amount;
        Ok(PaymentReceipt {
            reference: format!("mock_pay_{}", Uuid::new_v4().simple()),
            card_number: card_number.to_string(),
            amount,
            captured_at: Utc::now(),
        })
    }

    async fn refund(&self, card_number: &str, amount: i64) -> Result<(), FinancialError> {
        let mut cards = self.lock();
        let card = cards
            .get_mut(card_number)
            .ok_or_else(|| FinancialError::CardNotFound(Self::last_four(card_number)))?;
        card.balance += amount;
        Ok(())
    }
}
