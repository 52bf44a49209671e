use crate::pool::{SeatPool, SeatPoolSnapshot};
use aerovia_shared::{FlightCategory, SeatClass};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("seat pool already exists for flight {0}")]
    Conflict(String),

    #[error("no seat pool found for flight {0}")]
    NotFound(String),

    #[error("no {seat_class} seats available on flight {flight_code}")]
    NoSeatsAvailable {
        flight_code: String,
        seat_class: SeatClass,
    },

    #[error("seat {seat} is not occupied in {seat_class} on flight {flight_code}")]
    InvalidSeatState {
        flight_code: String,
        seat_class: SeatClass,
        seat: u32,
    },

    #[error("seat pool for flight {0} is cancelled")]
    PoolCancelled(String),

    #[error("seat pool for flight {0} was already cancelled")]
    AlreadyCancelled(String),
}

/// Authority over every flight's seat map. Each pool sits behind its own
/// mutex, so seat operations are atomic per flight while distinct flights
/// proceed fully in parallel.
pub struct SeatInventory {
    pools: RwLock<HashMap<String, Arc<Mutex<SeatPool>>>>,
}

impl SeatInventory {
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    /// Create the pool for a freshly scheduled flight, all seats available.
    pub async fn initialize(
        &self,
        flight_code: &str,
        category: FlightCategory,
    ) -> Result<(), InventoryError> {
        let mut pools = self.pools.write().await;
        if pools.contains_key(flight_code) {
            return Err(InventoryError::Conflict(flight_code.to_string()));
        }
        pools.insert(
            flight_code.to_string(),
            Arc::new(Mutex::new(SeatPool::new(flight_code, category))),
        );
        info!(flight_code, ?category, "seat pool initialized");
        Ok(())
    }

    async fn pool_handle(&self, flight_code: &str) -> Result<Arc<Mutex<SeatPool>>, InventoryError> {
        let pools = self.pools.read().await;
        pools
            .get(flight_code)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(flight_code.to_string()))
    }

    /// Pick a uniformly random available seat and move it to occupied.
    /// Pick and move happen under the flight's lock, so two concurrent
    /// callers can never receive the same seat.
    pub async fn assign_seat(
        &self,
        flight_code: &str,
        seat_class: SeatClass,
    ) -> Result<u32, InventoryError> {
        let handle = self.pool_handle(flight_code).await?;
        let mut pool = handle.lock().await;
        if pool.cancelled {
            return Err(InventoryError::PoolCancelled(flight_code.to_string()));
        }
        let seat = pool
            .assign(seat_class)
            .ok_or_else(|| InventoryError::NoSeatsAvailable {
                flight_code: flight_code.to_string(),
                seat_class,
            })?;
        debug!(flight_code, %seat_class, seat, "seat assigned");
        Ok(seat)
    }

    /// Return an occupied seat to the available set.
    pub async fn release_seat(
        &self,
        flight_code: &str,
        seat_class: SeatClass,
        seat: u32,
    ) -> Result<(), InventoryError> {
        let handle = self.pool_handle(flight_code).await?;
        let mut pool = handle.lock().await;
        if !pool.release(seat_class, seat) {
            return Err(InventoryError::InvalidSeatState {
                flight_code: flight_code.to_string(),
                seat_class,
                seat,
            });
        }
        debug!(flight_code, %seat_class, seat, "seat released");
        Ok(())
    }

    /// Swap `old_seat` for a fresh one in a single lock hold. The freed
    /// seat is never handed back in the same call; with the cabin otherwise
    /// full the old seat is kept and `NoSeatsAvailable` is returned.
    pub async fn change_seat(
        &self,
        flight_code: &str,
        seat_class: SeatClass,
        old_seat: u32,
    ) -> Result<u32, InventoryError> {
        let handle = self.pool_handle(flight_code).await?;
        let mut pool = handle.lock().await;
        if pool.cancelled {
            return Err(InventoryError::PoolCancelled(flight_code.to_string()));
        }
        if !pool.class(seat_class).is_occupied(old_seat) {
            return Err(InventoryError::InvalidSeatState {
                flight_code: flight_code.to_string(),
                seat_class,
                seat: old_seat,
            });
        }
        let seat =
            pool.reassign(seat_class, old_seat)
                .ok_or_else(|| InventoryError::NoSeatsAvailable {
                    flight_code: flight_code.to_string(),
                    seat_class,
                })?;
        debug!(flight_code, %seat_class, old_seat, seat, "seat changed");
        Ok(seat)
    }

    /// Stop assignments and seat changes for a cancelled flight. Releases
    /// stay allowed so the cancellation cascade can drain occupancy.
    /// Cancelling twice is an error, matching the gate on the flight itself.
    pub async fn cancel_pool(&self, flight_code: &str) -> Result<(), InventoryError> {
        let handle = self.pool_handle(flight_code).await?;
        let mut pool = handle.lock().await;
        if pool.cancelled {
            return Err(InventoryError::AlreadyCancelled(flight_code.to_string()));
        }
        pool.cancelled = true;
        info!(flight_code, "seat pool cancelled");
        Ok(())
    }

    pub async fn snapshot(&self, flight_code: &str) -> Result<SeatPoolSnapshot, InventoryError> {
        let handle = self.pool_handle(flight_code).await?;
        let pool = handle.lock().await;
        Ok(pool.snapshot())
    }
}

impl Default for SeatInventory {
    fn default() -> Self {
        Self::new()
    }
}
