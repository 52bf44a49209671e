use crate::models::{
    CompensatedTicket, FlightCancellationSummary, Purchase, PurchaseReceipt, RefundFailure,
    TicketCancellation,
};
use aerovia_core::{FinancialError, FinancialGateway, Notifier};
use aerovia_flight::{Flight, FlightDirectory, FlightError, FlightSpec};
use aerovia_inventory::{InventoryError, SeatInventory};
use aerovia_ledger::{LedgerError, TicketLedger, TicketState};
use aerovia_shared::TicketRef;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Financial(#[from] FinancialError),

    #[error(transparent)]
    Flight(#[from] FlightError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("purchase not found: {0}")]
    PurchaseNotFound(Uuid),

    #[error("a purchase needs at least one ticket")]
    EmptyPurchase,
}

/// Orchestrates the money-touching flows: settling a batch of reservations
/// into a purchase, refunding cancellations, and driving the full flight
/// cancellation cascade.
pub struct PurchaseCoordinator {
    flights: Arc<FlightDirectory>,
    inventory: Arc<SeatInventory>,
    ledger: Arc<TicketLedger>,
    financial: Arc<dyn FinancialGateway>,
    notifier: Arc<dyn Notifier>,
    purchases: RwLock<HashMap<Uuid, Purchase>>,
}

impl PurchaseCoordinator {
    pub fn new(
        flights: Arc<FlightDirectory>,
        inventory: Arc<SeatInventory>,
        ledger: Arc<TicketLedger>,
        financial: Arc<dyn FinancialGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            flights,
            inventory,
            ledger,
            financial,
            notifier,
            purchases: RwLock::new(HashMap::new()),
        }
    }

    /// Schedule a flight and stand up its seat pool in one step.
    pub async fn schedule_flight(&self, spec: FlightSpec) -> Result<Flight, PurchaseError> {
        let flight = self.flights.create_flight(spec).await?;
        self.inventory
            .initialize(&flight.code, flight.category)
            .await?;
        Ok(flight)
    }

    /// Settle a batch of reservations. Every ticket is validated before any
    /// money moves; payment is captured once for the batch total; linkage
    /// follows. A ticket that cannot be linked after capture is compensated
    /// with an immediate refund of its price and reported in the receipt,
    /// so a captured payment never silently exceeds the linked tickets.
    pub async fn create_purchase(
        &self,
        username: &str,
        card_number: &str,
        cvv: &str,
        ticket_refs: &[TicketRef],
    ) -> Result<PurchaseReceipt, PurchaseError> {
        if ticket_refs.is_empty() {
            return Err(PurchaseError::EmptyPurchase);
        }

        let mut total = 0i64;
        let mut prices: Vec<i64> = Vec::with_capacity(ticket_refs.len());
        for ticket_ref in ticket_refs {
            let ticket = self.ledger.find(ticket_ref).await?;
            match ticket.state {
                TicketState::Reserved => {}
                TicketState::Purchased { .. } => {
                    return Err(LedgerError::AlreadyPurchased(ticket_ref.clone()).into())
                }
                TicketState::Cancelled => {
                    return Err(LedgerError::AlreadyCancelled(ticket_ref.clone()).into())
                }
            }
            total += ticket.price;
            prices.push(ticket.price);
        }

        let receipt = self.financial.pay(card_number, cvv, total).await?;

        let purchase = Purchase {
            id: Uuid::new_v4(),
            username: username.to_string(),
            card_number: card_number.to_string(),
            total,
            payment_reference: receipt.reference,
            created_at: Utc::now(),
        };
        self.purchases
            .write()
            .await
            .insert(purchase.id, purchase.clone());

        let mut compensated = Vec::new();
        for (ticket_ref, price) in ticket_refs.iter().zip(prices) {
            if let Err(link_err) = self
                .ledger
                .set_purchase_linkage(ticket_ref, purchase.id)
                .await
            {
                warn!(%ticket_ref, %link_err, "linkage failed after capture, refunding ticket price");
                if let Err(refund_err) = self.financial.refund(card_number, price).await {
                    error!(%ticket_ref, %refund_err, "compensating refund failed, manual reconciliation required");
                }
                compensated.push(CompensatedTicket {
                    ticket_ref: ticket_ref.clone(),
                    amount: price,
                    reason: link_err.to_string(),
                });
            }
        }

        let linked = ticket_refs.len() - compensated.len();
        if let Err(err) = self
            .notifier
            .notify(
                username,
                "Purchase confirmed",
                &format!("Your purchase of {linked} ticket(s) for {total} was settled."),
            )
            .await
        {
            warn!(%err, username, "purchase notification failed");
        }
        info!(purchase_id = %purchase.id, username, total, linked, "purchase settled");

        Ok(PurchaseReceipt {
            purchase,
            ticket_count: linked,
            compensated,
        })
    }

    /// Cancel a single ticket. A purchased ticket is refunded for exactly
    /// its own price against the purchase's card; the rest of the purchase
    /// stays intact. Once the ledger has cancelled the ticket that state is
    /// final, so a refund that cannot be delivered is carried in the result
    /// instead of failing the call.
    pub async fn cancel_ticket(
        &self,
        ticket_ref: &TicketRef,
    ) -> Result<TicketCancellation, PurchaseError> {
        let cancelled = self.ledger.cancel_ticket(ticket_ref).await?;
        let mut refund_failure = None;
        if let Some(refund) = &cancelled.refund {
            let purchase = self.purchases.read().await.get(&refund.purchase_id).cloned();
            match purchase {
                Some(purchase) => {
                    match self
                        .financial
                        .refund(&purchase.card_number, refund.amount)
                        .await
                    {
                        Ok(()) => {
                            info!(%ticket_ref, amount = refund.amount, "ticket refunded");
                        }
                        Err(err) => {
                            error!(%ticket_ref, %err, "refund failed after ticket cancellation");
                            refund_failure = Some(RefundFailure {
                                purchase_id: refund.purchase_id,
                                amount: refund.amount,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
                None => {
                    error!(%ticket_ref, purchase_id = %refund.purchase_id, "purchase record missing during ticket cancellation");
                    refund_failure = Some(RefundFailure {
                        purchase_id: refund.purchase_id,
                        amount: refund.amount,
                        reason: "purchase record missing".to_string(),
                    });
                }
            }
        }
        Ok(TicketCancellation {
            cancelled,
            refund_failure,
        })
    }

    /// Cancel a flight end to end: lifecycle gate, seat pool shutdown,
    /// ticket cascade, one refund per affected purchase, one notification
    /// per affected user. Refund failures land in the summary instead of
    /// aborting the sweep.
    pub async fn cancel_flight(
        &self,
        flight_code: &str,
    ) -> Result<FlightCancellationSummary, PurchaseError> {
        self.flights.mark_cancelled(flight_code).await?;
        self.inventory.cancel_pool(flight_code).await?;
        let report = self.ledger.cancel_all_for_flight(flight_code).await;

        let mut refunded = Vec::new();
        let mut refund_failures = Vec::new();
        for (purchase_id, amount) in &report.refunds_by_purchase {
            let purchase = self.purchases.read().await.get(purchase_id).cloned();
            match purchase {
                Some(purchase) => {
                    match self.financial.refund(&purchase.card_number, *amount).await {
                        Ok(()) => refunded.push((*purchase_id, *amount)),
                        Err(err) => {
                            error!(%purchase_id, %err, "refund failed during flight cancellation");
                            refund_failures.push(RefundFailure {
                                purchase_id: *purchase_id,
                                amount: *amount,
                                reason: err.to_string(),
                            });
                        }
                    }
                }
                None => {
                    error!(%purchase_id, "purchase record missing during flight cancellation");
                    refund_failures.push(RefundFailure {
                        purchase_id: *purchase_id,
                        amount: *amount,
                        reason: "purchase record missing".to_string(),
                    });
                }
            }
        }

        let mut notified_users = Vec::new();
        for username in &report.affected_users {
            let outcome = self
                .notifier
                .notify(
                    username,
                    "Flight cancelled",
                    &format!("Flight {flight_code} was cancelled; your tickets were refunded."),
                )
                .await;
            match outcome {
                Ok(()) => notified_users.push(username.clone()),
                Err(err) => warn!(%err, username, "cancellation notification failed"),
            }
        }

        info!(
            flight_code,
            refunds = refunded.len(),
            failures = refund_failures.len(),
            "flight cancellation settled"
        );
        Ok(FlightCancellationSummary {
            report,
            refunded,
            refund_failures,
            notified_users,
        })
    }

    pub async fn find_purchase(&self, id: Uuid) -> Result<Purchase, PurchaseError> {
        self.purchases
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(PurchaseError::PurchaseNotFound(id))
    }

    pub async fn purchases_for_user(&self, username: &str) -> Vec<Purchase> {
        let purchases = self.purchases.read().await;
        let mut owned: Vec<Purchase> = purchases
            .values()
            .filter(|p| p.username == username)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        owned
    }
}
