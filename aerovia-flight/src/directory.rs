use crate::models::{Flight, FlightSpec};
use chrono::{Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum FlightError {
    #[error("flight not found: {0}")]
    NotFound(String),

    #[error("flight {0} was already cancelled")]
    AlreadyCancelled(String),

    #[error("flight {0} has already departed")]
    Departed(String),

    #[error("invalid prices: {0}")]
    InvalidPrice(String),

    #[error("departure must be at least {required_hours} hours away for a {category} flight")]
    DepartureTooSoon {
        category: String,
        required_hours: i64,
    },
}

/// Registry of scheduled flights and the lifecycle gates every other
/// component consults before mutating anything flight-related.
pub struct FlightDirectory {
    flights: RwLock<HashMap<String, Flight>>,
}

impl FlightDirectory {
    pub fn new() -> Self {
        Self {
            flights: RwLock::new(HashMap::new()),
        }
    }

    fn validate_prices(economy: i64, first: i64) -> Result<(), FlightError> {
        if economy <= 0 || first <= 0 {
            return Err(FlightError::InvalidPrice(
                "prices must be greater than zero".to_string(),
            ));
        }
        if economy >= first {
            return Err(FlightError::InvalidPrice(
                "economy price must be below first class price".to_string(),
            ));
        }
        Ok(())
    }

    fn route_prefix(place: &str) -> String {
        let letters: String = place
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .take(3)
            .collect::<String>()
            .to_uppercase();
        format!("{letters:X<3}")
    }

    /// Schedule a flight: validates prices and lead time, derives a unique
    /// `ORG-DST-nnnn` code and the arrival time from the category's block
    /// time. The caller initializes the seat pool with the returned flight.
    pub async fn create_flight(&self, spec: FlightSpec) -> Result<Flight, FlightError> {
        Self::validate_prices(spec.economy_price, spec.first_price)?;

        let now = Utc::now();
        let required = spec.category.minimum_lead_hours();
        if spec.departure - now < Duration::hours(required) {
            return Err(FlightError::DepartureTooSoon {
                category: format!("{:?}", spec.category),
                required_hours: required,
            });
        }

        let mut flights = self.flights.write().await;
        let prefix = format!(
            "{}-{}",
            Self::route_prefix(&spec.origin),
            Self::route_prefix(&spec.destination)
        );
        let code = loop {
            let candidate = format!("{}-{}", prefix, rand::rng().random_range(1000..10000));
            if !flights.contains_key(&candidate) {
                break candidate;
            }
        };

        let flight = Flight {
            code: code.clone(),
            origin: spec.origin,
            destination: spec.destination,
            category: spec.category,
            departure: spec.departure,
            arrival: spec.departure + Duration::hours(spec.category.flight_duration_hours()),
            economy_price: spec.economy_price,
            first_price: spec.first_price,
            cancelled: false,
            updater: spec.creator.clone(),
            creator: spec.creator,
            created_at: now,
            updated_at: now,
        };
        flights.insert(code.clone(), flight.clone());
        info!(code, "flight scheduled");
        Ok(flight)
    }

    pub async fn find(&self, flight_code: &str) -> Result<Flight, FlightError> {
        let flights = self.flights.read().await;
        flights
            .get(flight_code)
            .cloned()
            .ok_or_else(|| FlightError::NotFound(flight_code.to_string()))
    }

    /// The gate ticketing consults: the flight must exist, not be
    /// cancelled, and not have departed.
    pub async fn ensure_bookable(&self, flight_code: &str) -> Result<Flight, FlightError> {
        let flight = self.find(flight_code).await?;
        if flight.cancelled {
            return Err(FlightError::AlreadyCancelled(flight_code.to_string()));
        }
        if flight.has_departed(Utc::now()) {
            return Err(FlightError::Departed(flight_code.to_string()));
        }
        Ok(flight)
    }

    /// Reprice a flight. Only allowed while the flight is still active.
    pub async fn change_price(
        &self,
        flight_code: &str,
        economy_price: i64,
        first_price: i64,
        updater: &str,
    ) -> Result<Flight, FlightError> {
        Self::validate_prices(economy_price, first_price)?;
        let mut flights = self.flights.write().await;
        let flight = flights
            .get_mut(flight_code)
            .ok_or_else(|| FlightError::NotFound(flight_code.to_string()))?;
        if flight.cancelled {
            return Err(FlightError::AlreadyCancelled(flight_code.to_string()));
        }
        if flight.has_departed(Utc::now()) {
            return Err(FlightError::Departed(flight_code.to_string()));
        }
        flight.economy_price = economy_price;
        flight.first_price = first_price;
        flight.updater = updater.to_string();
        flight.updated_at = Utc::now();
        info!(flight_code, economy_price, first_price, "flight repriced");
        Ok(flight.clone())
    }

    /// Soft-cancel a flight. The cascade into seats, tickets, and refunds
    /// is orchestrated above this layer.
    pub async fn mark_cancelled(&self, flight_code: &str) -> Result<Flight, FlightError> {
        let mut flights = self.flights.write().await;
        let flight = flights
            .get_mut(flight_code)
            .ok_or_else(|| FlightError::NotFound(flight_code.to_string()))?;
        if flight.has_departed(Utc::now()) {
            return Err(FlightError::Departed(flight_code.to_string()));
        }
        if flight.cancelled {
            return Err(FlightError::AlreadyCancelled(flight_code.to_string()));
        }
        flight.cancelled = true;
        flight.updated_at = Utc::now();
        info!(flight_code, "flight cancelled");
        Ok(flight.clone())
    }

    /// Flights still open for booking, for listing surfaces.
    pub async fn active_flights(&self) -> Vec<Flight> {
        let now = Utc::now();
        let flights = self.flights.read().await;
        let mut active: Vec<Flight> = flights
            .values()
            .filter(|f| f.is_active(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| a.departure.cmp(&b.departure));
        active
    }
}

impl Default for FlightDirectory {
    fn default() -> Self {
        Self::new()
    }
}
