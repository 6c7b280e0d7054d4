//! Trait definitions for the Box Office stores
//!
//! The three stores are the only shared mutable state in the system; every
//! mutation to `booked_seats`, `status`, `booking_id`, or `ticket_id` goes
//! through these narrow primitives.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::{
    Booking, BookingId, EventId, NewBooking, Order, OrderId, OrderStatus, PaymentRef, SeatEvent,
    SessionRef, TicketId,
};

use super::Result;

/// Durable record of each event's seat counts.
///
/// Invariant: `0 <= booked_seats <= total_seats`, enforced by the store's
/// own conditional update, never by application-level read-then-write.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Atomically increment `booked_seats` by `seats` only if the result
    /// stays within `total_seats`. A single server-evaluated
    /// condition-and-mutate: concurrent callers racing for the last seats
    /// observe a linearized view of capacity.
    ///
    /// Returns the updated event, or `CapacityExceeded` without mutation.
    async fn try_reserve(&self, event_id: EventId, seats: u32) -> Result<SeatEvent>;

    /// Unconditionally decrement `booked_seats`, floored at zero. Used only
    /// as compensation for a reservation whose booking could not be
    /// written; never re-fails on capacity.
    async fn release(&self, event_id: EventId, seats: u32) -> Result<()>;

    /// Create a seating event (catalog management itself is external; this
    /// exists for fixtures and provisioning).
    async fn insert_event(&self, event: &SeatEvent) -> Result<()>;

    /// Read an event by id
    async fn get_event(&self, event_id: EventId) -> Result<Option<SeatEvent>>;
}

/// Durable record of each purchase attempt.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderLedger: Send + Sync {
    /// Persist a new order (status Pending, no session attached yet)
    async fn create(&self, order: &Order) -> Result<()>;

    /// Read an order by id
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Read an order by its provider session reference
    async fn get_by_session_ref(&self, session_ref: &SessionRef) -> Result<Option<Order>>;

    /// Attach the provider session reference once the session exists
    async fn attach_session(&self, order_id: OrderId, session_ref: &SessionRef) -> Result<()>;

    /// Transition a still-Pending order to the given terminal status.
    /// The status gate is evaluated by the store in the update itself;
    /// returns `true` if a row transitioned, `false` if the order was
    /// already terminal (the caller re-reads and adapts).
    async fn transition(&self, order_id: OrderId, to: OrderStatus) -> Result<bool>;

    /// Commit a successful finalization: `status=Paid`, booking and ticket
    /// identifiers, and the provider payment reference, in one update gated
    /// on the order still being Pending. Returns `true` if a row changed.
    async fn commit_paid(
        &self,
        order_id: OrderId,
        booking_id: BookingId,
        ticket_id: &TicketId,
        payment_ref: Option<PaymentRef>,
    ) -> Result<bool>;
}

/// Durable record of completed, paid reservations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Create a booking. Fails distinguishably with `DuplicateTicket` when
    /// the ticket token collides and `DuplicateSession` when a booking
    /// already exists for the same provider session; both conditions are
    /// consumed by the finalizer, never surfaced to the buyer.
    async fn create(&self, booking: &NewBooking) -> Result<Booking>;

    /// Read a booking by id
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Read the booking created for a provider session, if any
    async fn get_by_session_ref(&self, session_ref: &SessionRef) -> Result<Option<Booking>>;
}
