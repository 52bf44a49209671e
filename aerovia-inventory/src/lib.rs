pub mod inventory;
pub mod pool;

pub use inventory::{InventoryError, SeatInventory};
pub use pool::{SeatPool, SeatPoolSnapshot};
