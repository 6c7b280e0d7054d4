//! Error types for the Box Office store layer

use thiserror::Error;

use crate::domain::{EventId, OrderId, OrderStatus, SessionRef, TicketId};

/// Errors that can occur against the durable stores
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Seating event not found
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Order not found
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// Booking not found
    #[error("booking not found for session: {0}")]
    BookingNotFound(SessionRef),

    /// The capacity-checked reservation did not fit
    #[error("not enough seats for event {event_id}: requested {requested}, available {available}")]
    CapacityExceeded {
        event_id: EventId,
        requested: u32,
        available: u32,
    },

    /// Ticket token collided with an existing booking
    #[error("ticket id already issued: {0}")]
    DuplicateTicket(TicketId),

    /// A booking already exists for this provider session
    #[error("booking already exists for session: {0}")]
    DuplicateSession(SessionRef),

    /// A status transition was refused because the order is already terminal
    #[error("invalid status transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl StoreError {
    /// Business-level conditions the finalizer handles explicitly, as
    /// opposed to infrastructure failures that trigger compensation.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::CapacityExceeded { .. }
                | StoreError::DuplicateTicket(_)
                | StoreError::DuplicateSession(_)
        )
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
