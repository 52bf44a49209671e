pub mod models;

pub use models::{FlightCategory, SeatClass, TicketRef};
