//! Bookings: completed, paid reservations.
//!
//! Created exactly once per successfully finalized order and never mutated
//! afterwards (cancellation is a separate flow outside this service).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookingId, EventId, OrderId, PaymentRef, SessionRef, TicketId, UserId};

/// Payment state recorded on the booking at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "paid" => Some(PaymentStatus::Paid),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finalized reservation of seats, carrying the presentable ticket token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub booking_id: BookingId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub seats: u32,
    /// Globally unique, enforced by the ledger's unique index
    pub ticket_id: TicketId,
    pub payment_status: PaymentStatus,
    /// Unique per booking: at most one booking per provider session
    pub session_ref: SessionRef,
    pub payment_ref: Option<PaymentRef>,
    pub created_at: DateTime<Utc>,
}

/// Everything the ledger needs to create a booking. The ledger assigns the
/// row its timestamp; the caller supplies the identifiers.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_id: BookingId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub seats: u32,
    pub ticket_id: TicketId,
    pub payment_status: PaymentStatus,
    pub session_ref: SessionRef,
    pub payment_ref: Option<PaymentRef>,
}
