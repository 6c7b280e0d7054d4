//! PostgreSQL implementations of the Box Office stores

mod bookings;
mod inventory;
mod orders;

pub use bookings::PgBookingLedger;
pub use inventory::PgInventoryStore;
pub use orders::PgOrderLedger;
