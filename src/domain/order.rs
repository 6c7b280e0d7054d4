//! Order lifecycle.
//!
//! An order is created Pending when checkout begins and is mutated only by
//! the finalization state machine and the provider's expiry signal. The
//! lifecycle is an explicit finite-state type with a single transition
//! predicate; both completion triggers consult it rather than comparing
//! status strings ad hoc.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookingId, EventId, OrderId, PaymentRef, SessionRef, TicketId, UserId};

/// Lifecycle status of an order. Everything except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Awaiting payment confirmation from the provider
    #[default]
    Pending,
    /// Finalized: seats reserved, booking written, ticket minted
    Paid,
    /// Finalization could not complete (capacity exhausted or fatal write)
    Failed,
    /// Provider reported the checkout session expired while still pending
    Expired,
    /// Checkout abandoned before a provider session existed
    Cancelled,
}

impl OrderStatus {
    /// Whether this status admits no further transitions
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// The single transition predicate consulted by every mutation path
    pub fn can_transition(&self, next: OrderStatus) -> bool {
        matches!(self, OrderStatus::Pending) && next != OrderStatus::Pending
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Expired => "expired",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "failed" => Some(OrderStatus::Failed),
            "expired" => Some(OrderStatus::Expired),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchase attempt: one per checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub event_id: EventId,
    pub user_id: UserId,
    /// Display name of the tier/ticket being sold
    pub ticket_name: String,
    pub quantity: u32,
    /// Price per seat in the minor currency unit
    pub unit_amount: i64,
    pub currency: String,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    /// Provider checkout session, attached once the session exists
    pub session_ref: Option<SessionRef>,
    /// Provider payment record, set at finalization
    pub payment_ref: Option<PaymentRef>,
    pub status: OrderStatus,
    pub booking_id: Option<BookingId>,
    pub ticket_id: Option<TicketId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// An order is resolved once both finalization identifiers are set;
    /// from then on finalize is a no-op returning the existing values.
    pub fn resolution(&self) -> Option<(TicketId, BookingId)> {
        match (&self.ticket_id, self.booking_id) {
            (Some(ticket), Some(booking)) => Some((ticket.clone(), booking)),
            _ => None,
        }
    }

    pub fn total_amount(&self) -> i64 {
        self.unit_amount.saturating_mul(i64::from(self.quantity))
    }
}
