use serde::{Deserialize, Serialize};
use std::fmt;

/// Cabin partition of a flight's seat map, each with independent
/// capacity and pricing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    First,
    Tourist,
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatClass::First => write!(f, "First"),
            SeatClass::Tourist => write!(f, "Tourist"),
        }
    }
}

/// Flight category, which fixes aircraft capacity and scheduling rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightCategory {
    National,
    International,
}

impl FlightCategory {
    pub fn total_seats(&self) -> u32 {
        match self {
            FlightCategory::National => 150,
            FlightCategory::International => 250,
        }
    }

    pub fn first_class_seats(&self) -> u32 {
        match self {
            FlightCategory::National => 25,
            FlightCategory::International => 50,
        }
    }

    pub fn tourist_seats(&self) -> u32 {
        self.total_seats() - self.first_class_seats()
    }

    /// Minimum hours between scheduling and departure.
    pub fn minimum_lead_hours(&self) -> i64 {
        match self {
            FlightCategory::National => 2,
            FlightCategory::International => 4,
        }
    }

    /// Nominal block time used to derive the arrival timestamp.
    pub fn flight_duration_hours(&self) -> i64 {
        match self {
            FlightCategory::National => 2,
            FlightCategory::International => 9,
        }
    }
}

/// Composite identity of a ticket: unique per flight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TicketRef {
    pub flight_code: String,
    pub passenger_dni: String,
}

impl TicketRef {
    pub fn new(flight_code: impl Into<String>, passenger_dni: impl Into<String>) -> Self {
        Self {
            flight_code: flight_code.into(),
            passenger_dni: passenger_dni.into(),
        }
    }
}

impl fmt::Display for TicketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.flight_code, self.passenger_dni)
    }
}
