//! Time-window rules for ticketing, kept as pure functions over explicit
//! clocks so the boundaries can be pinned down in tests.

use chrono::{DateTime, Duration, Utc};

/// A user may hold at most this many active tickets on one flight.
pub const MAX_TICKETS_PER_USER_PER_FLIGHT: usize = 5;

/// Unpurchased reservations are held for this long before being purged.
pub const RESERVATION_HOLD_HOURS: i64 = 24;

/// Cancellation and check-in close this long before departure.
pub const CLOSING_WINDOW_HOURS: i64 = 1;

/// A purchased ticket may be cancelled only while departure is strictly
/// more than one hour away. Exactly one hour out the window is closed.
pub fn cancellation_open(departure: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    departure - now > Duration::hours(CLOSING_WINDOW_HOURS)
}

/// Check-in shares the cancellation boundary: open while at least one hour
/// remains, closed at and inside the hour.
pub fn checkin_open(departure: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    departure - now > Duration::hours(CLOSING_WINDOW_HOURS)
}

/// Whether an unpurchased reservation should be swept: held past the
/// 24-hour window, departing within the closing window, or on a flight
/// that no longer operates.
pub fn reservation_stale(
    created_at: DateTime<Utc>,
    departure: DateTime<Utc>,
    flight_cancelled: bool,
    now: DateTime<Utc>,
) -> bool {
    flight_cancelled
        || now - created_at > Duration::hours(RESERVATION_HOLD_HOURS)
        || !cancellation_open(departure, now)
}
