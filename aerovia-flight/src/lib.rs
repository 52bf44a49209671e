pub mod directory;
pub mod models;

pub use directory::{FlightDirectory, FlightError};
pub use models::{Flight, FlightSpec};
