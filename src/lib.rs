//! Box Office Library
//!
//! Seat inventory and order finalization service for ticketed events. Sells
//! finite seating inventory and reconciles each sale with an external,
//! asynchronous payment provider: seats are decremented through a single
//! capacity-checked atomic update, and an idempotent finalize-or-rollback
//! state machine turns a paid provider session into exactly one durable
//! booking no matter how many times, or in what order, the status poll and
//! the webhook race to complete it.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (events, orders, bookings, tickets)
//! - [`infra`] - Store implementations (PostgreSQL, in-memory)
//! - [`checkout`] - The finalization state machine and provider boundary
//! - [`api`] - REST API routes
//! - [`server`] - HTTP server bootstrap

pub mod api;
pub mod checkout;
pub mod domain;
pub mod infra;
pub mod migrations;
pub mod server;

// Re-export commonly used types
pub use checkout::{FailureReason, Finalization, FinalizeError, Finalizer, PaymentGateway};
pub use domain::{
    Booking, BookingId, EventId, Order, OrderId, OrderStatus, PaymentProof, ProviderEvent,
    SeatEvent, SessionRef, TicketId, UserId,
};
pub use infra::{BookingLedger, InventoryStore, OrderLedger, Result, StoreError};
