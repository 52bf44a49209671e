use aerovia_shared::{FlightCategory, SeatClass};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled flight. Never physically deleted: cancellation flips the
/// `cancelled` flag and everything downstream reacts to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub code: String,
    pub origin: String,
    pub destination: String,
    pub category: FlightCategory,
    pub departure: DateTime<Utc>,
    pub arrival: DateTime<Utc>,
    pub economy_price: i64,
    pub first_price: i64,
    pub cancelled: bool,
    pub creator: String,
    pub updater: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flight {
    pub fn price_for(&self, seat_class: SeatClass) -> i64 {
        match seat_class {
            SeatClass::First => self.first_price,
            SeatClass::Tourist => self.economy_price,
        }
    }

    pub fn has_departed(&self, now: DateTime<Utc>) -> bool {
        self.departure <= now
    }

    /// Whether ticketing against this flight may proceed.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.cancelled && !self.has_departed(now)
    }

    /// Time remaining before departure, negative once the flight has left.
    pub fn time_to_departure(&self, now: DateTime<Utc>) -> Duration {
        self.departure - now
    }
}

/// Request to schedule a new flight. The code and arrival time are derived
/// by the directory.
#[derive(Debug, Clone, Deserialize)]
pub struct FlightSpec {
    pub origin: String,
    pub destination: String,
    pub category: FlightCategory,
    pub departure: DateTime<Utc>,
    pub economy_price: i64,
    pub first_price: i64,
    pub creator: String,
}
