use crate::models::{
    CancelledTicket, FlightCancellationReport, Passenger, RefundDue, Ticket, TicketOutcome,
    TicketState,
};
use crate::policy;
use aerovia_flight::{FlightDirectory, FlightError};
use aerovia_inventory::{InventoryError, SeatInventory};
use aerovia_shared::{SeatClass, TicketRef};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Flight(#[from] FlightError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("ticket not found: {0}")]
    TicketNotFound(TicketRef),

    #[error("passenger {dni} already holds a ticket on flight {flight_code}")]
    DuplicatePassenger { flight_code: String, dni: String },

    #[error("user {username} cannot hold more than {max} tickets on flight {flight_code}")]
    QuotaExceeded {
        flight_code: String,
        username: String,
        max: usize,
    },

    #[error("at least one adult passenger is required on flight {0}")]
    UnaccompaniedMinor(String),

    #[error("cancellation window closed for ticket {0}")]
    CancellationWindowClosed(TicketRef),

    #[error("ticket {0} was already cancelled")]
    AlreadyCancelled(TicketRef),

    #[error("ticket {0} is already linked to a purchase")]
    AlreadyPurchased(TicketRef),

    #[error("ticket {0} requires a settled purchase before check-in")]
    CheckInRequiresPurchase(TicketRef),

    #[error("ticket {0} is already checked in")]
    AlreadyCheckedIn(TicketRef),

    #[error("check-in window closed for ticket {0}")]
    CheckInClosed(TicketRef),

    #[error("seat for ticket {0} was already changed once")]
    SeatAlreadyChanged(TicketRef),
}

/// Owns every ticket record and enforces the booking rules: per-user
/// quotas, duplicate passengers, minor accompaniment, and the time windows
/// around departure. Seat custody is delegated to the inventory; lifecycle
/// gates to the flight directory.
pub struct TicketLedger {
    flights: Arc<FlightDirectory>,
    inventory: Arc<SeatInventory>,
    tickets: RwLock<HashMap<TicketRef, Ticket>>,
    issuance: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TicketLedger {
    pub fn new(flights: Arc<FlightDirectory>, inventory: Arc<SeatInventory>) -> Self {
        Self {
            flights,
            inventory,
            tickets: RwLock::new(HashMap::new()),
            issuance: Mutex::new(HashMap::new()),
        }
    }

    /// One lock per flight serializes the quota-check-then-insert window,
    /// so two concurrent bookings cannot jointly exceed the quota.
    async fn issuance_lock(&self, flight_code: &str) -> Arc<Mutex<()>> {
        let mut locks = self.issuance.lock().await;
        locks.entry(flight_code.to_string()).or_default().clone()
    }

    /// Issue one ticket per passenger on a flight, all in the same cabin.
    /// The batch is validated as a whole and either fully issued or not at
    /// all: a mid-batch seat exhaustion releases every seat taken so far.
    pub async fn issue_tickets(
        &self,
        flight_code: &str,
        username: &str,
        seat_class: SeatClass,
        passengers: Vec<Passenger>,
    ) -> Result<Vec<Ticket>, LedgerError> {
        if passengers.is_empty() {
            return Ok(Vec::new());
        }
        let flight = self.flights.ensure_bookable(flight_code).await?;
        let lock = self.issuance_lock(flight_code).await;
        let _guard = lock.lock().await;

        let now = Utc::now();
        let today = now.date_naive();
        {
            let tickets = self.tickets.read().await;
            let mut batch_dnis = HashSet::new();
            for passenger in &passengers {
                let duplicate_in_batch = !batch_dnis.insert(passenger.dni.as_str());
                let already_on_flight = tickets
                    .get(&TicketRef::new(flight_code, passenger.dni.clone()))
                    .map(Ticket::is_active)
                    .unwrap_or(false);
                if duplicate_in_batch || already_on_flight {
                    return Err(LedgerError::DuplicatePassenger {
                        flight_code: flight_code.to_string(),
                        dni: passenger.dni.clone(),
                    });
                }
            }

            let existing: Vec<&Ticket> = tickets
                .values()
                .filter(|t| {
                    t.flight_code == flight_code && t.username == username && t.is_active()
                })
                .collect();
            if existing.len() + passengers.len() > policy::MAX_TICKETS_PER_USER_PER_FLIGHT {
                return Err(LedgerError::QuotaExceeded {
                    flight_code: flight_code.to_string(),
                    username: username.to_string(),
                    max: policy::MAX_TICKETS_PER_USER_PER_FLIGHT,
                });
            }

            // Minors may not travel unaccompanied: the batch plus the
            // user's existing passengers must contain an adult.
            let has_adult = passengers.iter().any(|p| p.is_adult_on(today))
                || existing.iter().any(|t| t.passenger.is_adult_on(today));
            if !has_adult {
                return Err(LedgerError::UnaccompaniedMinor(flight_code.to_string()));
            }
        }

        let price = flight.price_for(seat_class);
        let mut issued: Vec<Ticket> = Vec::with_capacity(passengers.len());
        for passenger in passengers {
            match self.inventory.assign_seat(flight_code, seat_class).await {
                Ok(seat_number) => issued.push(Ticket {
                    flight_code: flight_code.to_string(),
                    passenger,
                    username: username.to_string(),
                    seat_class,
                    seat_number,
                    price,
                    state: TicketState::Reserved,
                    created_at: now,
                    checked_in: None,
                    seat_changed: false,
                }),
                Err(err) => {
                    for ticket in &issued {
                        if let Err(release_err) = self
                            .inventory
                            .release_seat(flight_code, seat_class, ticket.seat_number)
                            .await
                        {
                            warn!(%release_err, flight_code, "seat release failed during batch rollback");
                        }
                    }
                    return Err(err.into());
                }
            }
        }

        let mut tickets = self.tickets.write().await;
        for ticket in &issued {
            tickets.insert(ticket.ticket_ref(), ticket.clone());
        }
        info!(flight_code, username, count = issued.len(), "tickets issued");
        Ok(issued)
    }

    /// Attach a settled purchase to a reservation.
    pub async fn set_purchase_linkage(
        &self,
        ticket_ref: &TicketRef,
        purchase_id: Uuid,
    ) -> Result<(), LedgerError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(ticket_ref)
            .ok_or_else(|| LedgerError::TicketNotFound(ticket_ref.clone()))?;
        match ticket.state {
            TicketState::Reserved => {
                ticket.state = TicketState::Purchased { purchase_id };
                Ok(())
            }
            TicketState::Purchased { .. } => Err(LedgerError::AlreadyPurchased(ticket_ref.clone())),
            TicketState::Cancelled => Err(LedgerError::AlreadyCancelled(ticket_ref.clone())),
        }
    }

    /// Cancel one ticket. Purchased tickets are logically erased (the row
    /// is retained) and report the refund owed; pure reservations are
    /// hard-deleted. The 1-hour pre-departure window applies to purchased
    /// tickets unless the flight itself was cancelled.
    pub async fn cancel_ticket(
        &self,
        ticket_ref: &TicketRef,
    ) -> Result<CancelledTicket, LedgerError> {
        let now = Utc::now();
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get(ticket_ref)
            .cloned()
            .ok_or_else(|| LedgerError::TicketNotFound(ticket_ref.clone()))?;

        match ticket.state {
            TicketState::Cancelled => Err(LedgerError::AlreadyCancelled(ticket_ref.clone())),
            TicketState::Purchased { purchase_id } => {
                let flight = self.flights.find(&ticket.flight_code).await?;
                if !flight.cancelled && !policy::cancellation_open(flight.departure, now) {
                    return Err(LedgerError::CancellationWindowClosed(ticket_ref.clone()));
                }
                self.inventory
                    .release_seat(&ticket.flight_code, ticket.seat_class, ticket.seat_number)
                    .await?;
                if let Some(stored) = tickets.get_mut(ticket_ref) {
                    stored.state = TicketState::Cancelled;
                }
                info!(%ticket_ref, "purchased ticket cancelled");
                Ok(CancelledTicket {
                    ticket_ref: ticket_ref.clone(),
                    seat_number: ticket.seat_number,
                    refund: Some(RefundDue {
                        purchase_id,
                        amount: ticket.price,
                    }),
                })
            }
            TicketState::Reserved => {
                self.inventory
                    .release_seat(&ticket.flight_code, ticket.seat_class, ticket.seat_number)
                    .await?;
                tickets.remove(ticket_ref);
                info!(%ticket_ref, "reservation dropped");
                Ok(CancelledTicket {
                    ticket_ref: ticket_ref.clone(),
                    seat_number: ticket.seat_number,
                    refund: None,
                })
            }
        }
    }

    /// Compaction-on-read sweep over a user's reservations: anything held
    /// past 24 hours, departing within the hour, or on a cancelled flight
    /// is dropped and its seat released. Returns the survivors.
    pub async fn purge_stale_reservations(&self, username: &str) -> Vec<Ticket> {
        let now = Utc::now();
        let candidates: Vec<Ticket> = {
            let tickets = self.tickets.read().await;
            tickets
                .values()
                .filter(|t| t.username == username && t.state == TicketState::Reserved)
                .cloned()
                .collect()
        };

        let mut survivors = Vec::new();
        for ticket in candidates {
            let stale = match self.flights.find(&ticket.flight_code).await {
                Ok(flight) => policy::reservation_stale(
                    ticket.created_at,
                    flight.departure,
                    flight.cancelled,
                    now,
                ),
                // A reservation against an unknown flight cannot be kept.
                Err(_) => true,
            };
            if stale {
                // The reservation may have been settled into a purchase
                // since the candidate read; only a still-reserved row is
                // removed, and its seat released only on actual removal.
                let removed = {
                    let mut tickets = self.tickets.write().await;
                    match tickets.get(&ticket.ticket_ref()) {
                        Some(stored) if stored.state == TicketState::Reserved => {
                            tickets.remove(&ticket.ticket_ref());
                            true
                        }
                        _ => false,
                    }
                };
                if removed {
                    if let Err(err) = self
                        .inventory
                        .release_seat(&ticket.flight_code, ticket.seat_class, ticket.seat_number)
                        .await
                    {
                        warn!(%err, flight_code = %ticket.flight_code, "seat release failed during purge");
                    }
                    info!(ticket_ref = %ticket.ticket_ref(), "stale reservation purged");
                }
            } else {
                survivors.push(ticket);
            }
        }
        survivors.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        survivors
    }

    /// Cascade a flight cancellation over every active ticket. Failures are
    /// recorded per ticket instead of aborting the sweep, and the refund
    /// totals are aggregated per purchase for the coordinator to settle.
    pub async fn cancel_all_for_flight(&self, flight_code: &str) -> FlightCancellationReport {
        let mut report = FlightCancellationReport::new(flight_code);
        let targets: Vec<Ticket> = {
            let tickets = self.tickets.read().await;
            tickets
                .values()
                .filter(|t| t.flight_code == flight_code && t.is_active())
                .cloned()
                .collect()
        };

        for ticket in targets {
            let ticket_ref = ticket.ticket_ref();
            if let Err(err) = self
                .inventory
                .release_seat(flight_code, ticket.seat_class, ticket.seat_number)
                .await
            {
                warn!(%err, %ticket_ref, "cascade could not release seat");
                report.outcomes.push(TicketOutcome::Failed {
                    ticket_ref,
                    reason: err.to_string(),
                });
                continue;
            }
            match ticket.state {
                TicketState::Reserved => {
                    self.tickets.write().await.remove(&ticket_ref);
                    report
                        .outcomes
                        .push(TicketOutcome::ReservationDropped { ticket_ref });
                }
                TicketState::Purchased { purchase_id } => {
                    if let Some(stored) = self.tickets.write().await.get_mut(&ticket_ref) {
                        stored.state = TicketState::Cancelled;
                    }
                    *report.refunds_by_purchase.entry(purchase_id).or_insert(0) += ticket.price;
                    report.affected_users.insert(ticket.username.clone());
                    report.outcomes.push(TicketOutcome::Cancelled {
                        ticket_ref,
                        refund_due: ticket.price,
                    });
                }
                TicketState::Cancelled => {}
            }
        }
        info!(
            flight_code,
            outcomes = report.outcomes.len(),
            clean = report.is_clean(),
            "flight cancellation cascade complete"
        );
        report
    }

    /// Stamp a purchased ticket as checked in. Closed inside the final
    /// hour before departure, like cancellation.
    pub async fn check_in(&self, ticket_ref: &TicketRef) -> Result<Ticket, LedgerError> {
        let now = Utc::now();
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(ticket_ref)
            .ok_or_else(|| LedgerError::TicketNotFound(ticket_ref.clone()))?;
        match ticket.state {
            TicketState::Cancelled => Err(LedgerError::AlreadyCancelled(ticket_ref.clone())),
            TicketState::Reserved => Err(LedgerError::CheckInRequiresPurchase(ticket_ref.clone())),
            TicketState::Purchased { .. } => {
                if ticket.checked_in.is_some() {
                    return Err(LedgerError::AlreadyCheckedIn(ticket_ref.clone()));
                }
                let flight = self.flights.find(&ticket.flight_code).await?;
                if flight.cancelled {
                    return Err(FlightError::AlreadyCancelled(ticket.flight_code.clone()).into());
                }
                if !policy::checkin_open(flight.departure, now) {
                    return Err(LedgerError::CheckInClosed(ticket_ref.clone()));
                }
                ticket.checked_in = Some(now);
                info!(%ticket_ref, "passenger checked in");
                Ok(ticket.clone())
            }
        }
    }

    /// Move a ticket to a fresh seat in the same cabin. At most one change
    /// per ticket, and not after check-in.
    pub async fn change_seat(&self, ticket_ref: &TicketRef) -> Result<u32, LedgerError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets
            .get_mut(ticket_ref)
            .ok_or_else(|| LedgerError::TicketNotFound(ticket_ref.clone()))?;
        if !ticket.is_active() {
            return Err(LedgerError::AlreadyCancelled(ticket_ref.clone()));
        }
        if ticket.checked_in.is_some() {
            return Err(LedgerError::AlreadyCheckedIn(ticket_ref.clone()));
        }
        if ticket.seat_changed {
            return Err(LedgerError::SeatAlreadyChanged(ticket_ref.clone()));
        }
        let new_seat = self
            .inventory
            .change_seat(&ticket.flight_code, ticket.seat_class, ticket.seat_number)
            .await?;
        ticket.seat_number = new_seat;
        ticket.seat_changed = true;
        info!(%ticket_ref, new_seat, "seat changed");
        Ok(new_seat)
    }

    pub async fn find(&self, ticket_ref: &TicketRef) -> Result<Ticket, LedgerError> {
        let tickets = self.tickets.read().await;
        tickets
            .get(ticket_ref)
            .cloned()
            .ok_or_else(|| LedgerError::TicketNotFound(ticket_ref.clone()))
    }

    pub async fn tickets_for_user(&self, username: &str) -> Vec<Ticket> {
        let tickets = self.tickets.read().await;
        let mut owned: Vec<Ticket> = tickets
            .values()
            .filter(|t| t.username == username)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        owned
    }

    #[cfg(test)]
    async fn backdate_ticket(&self, ticket_ref: &TicketRef, hours: i64) {
        let mut tickets = self.tickets.write().await;
        if let Some(ticket) = tickets.get_mut(ticket_ref) {
            ticket.created_at -= chrono::Duration::hours(hours);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerovia_flight::{Flight, FlightSpec};
    use aerovia_shared::FlightCategory;
    use chrono::{Duration, NaiveDate};

    fn adult(dni: &str) -> Passenger {
        Passenger {
            dni: dni.to_string(),
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 3, 12).unwrap(),
            email: Some("ana@example.com".to_string()),
        }
    }

    fn minor(dni: &str) -> Passenger {
        Passenger {
            dni: dni.to_string(),
            first_name: "Leo".to_string(),
            last_name: "Rojas".to_string(),
            birth_date: (Utc::now() - Duration::days(365 * 10)).date_naive(),
            email: None,
        }
    }

    async fn setup() -> (Arc<FlightDirectory>, Arc<SeatInventory>, TicketLedger) {
        let flights = Arc::new(FlightDirectory::new());
        let inventory = Arc::new(SeatInventory::new());
        let ledger = TicketLedger::new(Arc::clone(&flights), Arc::clone(&inventory));
        (flights, inventory, ledger)
    }

    async fn schedule(
        flights: &FlightDirectory,
        inventory: &SeatInventory,
        hours_out: i64,
    ) -> Flight {
        let flight = flights
            .create_flight(FlightSpec {
                origin: "Bogota".to_string(),
                destination: "Medellin".to_string(),
                category: FlightCategory::National,
                departure: Utc::now() + Duration::hours(hours_out),
                economy_price: 250_000,
                first_price: 800_000,
                creator: "admin".to_string(),
            })
            .await
            .unwrap();
        inventory
            .initialize(&flight.code, flight.category)
            .await
            .unwrap();
        flight
    }

    #[tokio::test]
    async fn test_issue_reserves_seat_at_class_price() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;

        let tickets = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        assert_eq!(tickets.len(), 1);
        assert_eq!(tickets[0].price, 250_000);
        assert_eq!(tickets[0].state, TicketState::Reserved);
        assert!((26..=150).contains(&tickets[0].seat_number));

        let snapshot = inventory.snapshot(&flight.code).await.unwrap();
        assert_eq!(snapshot.tourist_available, 124);
        assert_eq!(snapshot.tourist_occupied, 1);
    }

    #[tokio::test]
    async fn test_duplicate_passenger_rejected() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;

        ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let err = ledger
            .issue_tickets(&flight.code, "maria", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePassenger { .. }));

        // Duplicates inside one batch are caught before any seat moves.
        let err = ledger
            .issue_tickets(
                &flight.code,
                "maria",
                SeatClass::Tourist,
                vec![adult("20"), adult("20")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicatePassenger { .. }));
        let snapshot = inventory.snapshot(&flight.code).await.unwrap();
        assert_eq!(snapshot.tourist_occupied, 1);
    }

    #[tokio::test]
    async fn test_quota_accepts_five_rejects_six() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;

        let mut seats = HashSet::new();
        for i in 0..5 {
            let issued = ledger
                .issue_tickets(
                    &flight.code,
                    "carlos",
                    SeatClass::Tourist,
                    vec![adult(&format!("1{i}"))],
                )
                .await
                .unwrap();
            assert!(seats.insert(issued[0].seat_number));
        }
        assert_eq!(seats.len(), 5);

        let err = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("99")])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::QuotaExceeded { .. }));
    }

    #[tokio::test]
    async fn test_minors_need_an_adult() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;

        let err = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![minor("30")])
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnaccompaniedMinor(_)));

        // A batch with one adult passes.
        ledger
            .issue_tickets(
                &flight.code,
                "carlos",
                SeatClass::Tourist,
                vec![minor("30"), adult("31")],
            )
            .await
            .unwrap();

        // A minor added later rides on the user's existing adult.
        ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![minor("32")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_issue_rejected_on_cancelled_flight() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;
        flights.mark_cancelled(&flight.code).await.unwrap();

        let err = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Flight(FlightError::AlreadyCancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_rolls_back_on_exhaustion() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;

        // Occupy 23 of the 25 first class seats across several users.
        for user in 0..4 {
            let batch: Vec<Passenger> =
                (0..5).map(|i| adult(&format!("u{user}p{i}"))).collect();
            ledger
                .issue_tickets(&flight.code, &format!("user{user}"), SeatClass::First, batch)
                .await
                .unwrap();
        }
        let batch: Vec<Passenger> = (0..3).map(|i| adult(&format!("wp{i}"))).collect();
        ledger
            .issue_tickets(&flight.code, "walter", SeatClass::First, batch)
            .await
            .unwrap();

        // A batch of three cannot fit into the remaining two seats; the
        // partially assigned seats must come back.
        let batch: Vec<Passenger> = (0..3).map(|i| adult(&format!("zp{i}"))).collect();
        let err = ledger
            .issue_tickets(&flight.code, "zoe", SeatClass::First, batch)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Inventory(InventoryError::NoSeatsAvailable { .. })
        ));
        let snapshot = inventory.snapshot(&flight.code).await.unwrap();
        assert_eq!(snapshot.first_occupied, 23);
        assert_eq!(snapshot.first_available, 2);
    }

    #[tokio::test]
    async fn test_linkage_transitions() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;
        let issued = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let ticket_ref = issued[0].ticket_ref();
        let purchase_id = Uuid::new_v4();

        ledger
            .set_purchase_linkage(&ticket_ref, purchase_id)
            .await
            .unwrap();
        let ticket = ledger.find(&ticket_ref).await.unwrap();
        assert_eq!(ticket.purchase_id(), Some(purchase_id));

        let err = ledger
            .set_purchase_linkage(&ticket_ref, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyPurchased(_)));
    }

    #[tokio::test]
    async fn test_cancel_reservation_hard_deletes() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;
        let issued = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let ticket_ref = issued[0].ticket_ref();

        let cancelled = ledger.cancel_ticket(&ticket_ref).await.unwrap();
        assert!(cancelled.refund.is_none());
        assert!(matches!(
            ledger.find(&ticket_ref).await.unwrap_err(),
            LedgerError::TicketNotFound(_)
        ));
        let snapshot = inventory.snapshot(&flight.code).await.unwrap();
        assert_eq!(snapshot.tourist_available, 125);
    }

    #[tokio::test]
    async fn test_cancel_purchased_keeps_row_and_reports_refund() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;
        let issued = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::First, vec![adult("10")])
            .await
            .unwrap();
        let ticket_ref = issued[0].ticket_ref();
        let purchase_id = Uuid::new_v4();
        ledger
            .set_purchase_linkage(&ticket_ref, purchase_id)
            .await
            .unwrap();

        let cancelled = ledger.cancel_ticket(&ticket_ref).await.unwrap();
        let refund = cancelled.refund.unwrap();
        assert_eq!(refund.purchase_id, purchase_id);
        assert_eq!(refund.amount, 800_000);

        let ticket = ledger.find(&ticket_ref).await.unwrap();
        assert_eq!(ticket.state, TicketState::Cancelled);
        let err = ledger.cancel_ticket(&ticket_ref).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyCancelled(_)));
    }

    #[tokio::test]
    async fn test_purge_drops_aged_and_flight_cancelled_reservations() {
        let (flights, inventory, ledger) = setup().await;
        let flight_a = schedule(&flights, &inventory, 30).await;
        let flight_b = schedule(&flights, &inventory, 30).await;

        let aged = ledger
            .issue_tickets(&flight_a.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let fresh = ledger
            .issue_tickets(&flight_a.code, "carlos", SeatClass::Tourist, vec![adult("11")])
            .await
            .unwrap();
        let doomed = ledger
            .issue_tickets(&flight_b.code, "carlos", SeatClass::Tourist, vec![adult("12")])
            .await
            .unwrap();

        ledger.backdate_ticket(&aged[0].ticket_ref(), 25).await;
        flights.mark_cancelled(&flight_b.code).await.unwrap();

        let survivors = ledger.purge_stale_reservations("carlos").await;
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].ticket_ref(), fresh[0].ticket_ref());
        assert!(matches!(
            ledger.find(&aged[0].ticket_ref()).await.unwrap_err(),
            LedgerError::TicketNotFound(_)
        ));
        assert!(matches!(
            ledger.find(&doomed[0].ticket_ref()).await.unwrap_err(),
            LedgerError::TicketNotFound(_)
        ));

        let snapshot = inventory.snapshot(&flight_a.code).await.unwrap();
        assert_eq!(snapshot.tourist_occupied, 1);
    }

    #[tokio::test]
    async fn test_purge_never_deletes_a_ticket_settled_mid_sweep() {
        let (flights, inventory, ledger) = setup().await;
        let ledger = Arc::new(ledger);
        let flight = schedule(&flights, &inventory, 30).await;

        // Race the sweep against a settling purchase over many rounds.
        // Whichever wins, the outcome must be consistent: a linked ticket
        // stays purchased with its seat occupied, a purged one is fully
        // gone with its seat back.
        for round in 0..100 {
            let issued = ledger
                .issue_tickets(
                    &flight.code,
                    &format!("user{round}"),
                    SeatClass::Tourist,
                    vec![adult(&format!("r{round}"))],
                )
                .await
                .unwrap();
            let ticket_ref = issued[0].ticket_ref();
            ledger.backdate_ticket(&ticket_ref, 25).await;

            let purge = {
                let ledger = Arc::clone(&ledger);
                let username = format!("user{round}");
                tokio::spawn(async move { ledger.purge_stale_reservations(&username).await })
            };
            let link = {
                let ledger = Arc::clone(&ledger);
                let ticket_ref = ticket_ref.clone();
                tokio::spawn(async move {
                    ledger.set_purchase_linkage(&ticket_ref, Uuid::new_v4()).await
                })
            };
            purge.await.unwrap();
            let linked = link.await.unwrap().is_ok();

            match ledger.find(&ticket_ref).await {
                Ok(ticket) => {
                    assert!(linked, "surviving ticket must be the linked one");
                    assert!(matches!(ticket.state, TicketState::Purchased { .. }));
                    // Clean up so occupancy checks stay exact.
                    inventory
                        .release_seat(&flight.code, SeatClass::Tourist, ticket.seat_number)
                        .await
                        .unwrap();
                    ledger.tickets.write().await.remove(&ticket_ref);
                }
                Err(LedgerError::TicketNotFound(_)) => {
                    assert!(!linked, "a purged ticket cannot also be linked");
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
            let snapshot = inventory.snapshot(&flight.code).await.unwrap();
            assert_eq!(snapshot.tourist_occupied, 0, "round {round} leaked a seat");
        }
    }

    #[tokio::test]
    async fn test_cascade_reports_refunds_per_purchase() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;

        let purchased = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let reserved = ledger
            .issue_tickets(&flight.code, "maria", SeatClass::First, vec![adult("20")])
            .await
            .unwrap();
        let purchase_id = Uuid::new_v4();
        ledger
            .set_purchase_linkage(&purchased[0].ticket_ref(), purchase_id)
            .await
            .unwrap();

        let report = ledger.cancel_all_for_flight(&flight.code).await;
        assert!(report.is_clean());
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.refunds_by_purchase.get(&purchase_id), Some(&250_000));
        assert!(report.affected_users.contains("carlos"));
        assert!(!report.affected_users.contains("maria"));

        // Purchased ticket is retained as cancelled; reservation is gone.
        assert_eq!(
            ledger.find(&purchased[0].ticket_ref()).await.unwrap().state,
            TicketState::Cancelled
        );
        assert!(ledger.find(&reserved[0].ticket_ref()).await.is_err());

        let snapshot = inventory.snapshot(&flight.code).await.unwrap();
        assert_eq!(snapshot.tourist_occupied, 0);
        assert_eq!(snapshot.first_occupied, 0);
    }

    #[tokio::test]
    async fn test_check_in_gates() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;
        let issued = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let ticket_ref = issued[0].ticket_ref();

        let err = ledger.check_in(&ticket_ref).await.unwrap_err();
        assert!(matches!(err, LedgerError::CheckInRequiresPurchase(_)));

        ledger
            .set_purchase_linkage(&ticket_ref, Uuid::new_v4())
            .await
            .unwrap();
        let ticket = ledger.check_in(&ticket_ref).await.unwrap();
        assert!(ticket.checked_in.is_some());

        let err = ledger.check_in(&ticket_ref).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyCheckedIn(_)));
    }

    #[tokio::test]
    async fn test_change_seat_once() {
        let (flights, inventory, ledger) = setup().await;
        let flight = schedule(&flights, &inventory, 3).await;
        let issued = ledger
            .issue_tickets(&flight.code, "carlos", SeatClass::Tourist, vec![adult("10")])
            .await
            .unwrap();
        let ticket_ref = issued[0].ticket_ref();
        let old_seat = issued[0].seat_number;

        let new_seat = ledger.change_seat(&ticket_ref).await.unwrap();
        assert_ne!(new_seat, old_seat);
        let ticket = ledger.find(&ticket_ref).await.unwrap();
        assert_eq!(ticket.seat_number, new_seat);
        assert!(ticket.seat_changed);

        let err = ledger.change_seat(&ticket_ref).await.unwrap_err();
        assert!(matches!(err, LedgerError::SeatAlreadyChanged(_)));

        // Occupancy is unchanged by the swap.
        let snapshot = inventory.snapshot(&flight.code).await.unwrap();
        assert_eq!(snapshot.tourist_occupied, 1);
    }
}
