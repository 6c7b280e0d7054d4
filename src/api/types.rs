//! Request/response DTOs for the Box Office API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkout::{FailureReason, Finalization};
use crate::domain::{Order, OrderId, OrderStatus, TicketId};

/// Body of `POST /api/v1/checkout`. `user_id` arrives from the (external)
/// auth layer fronting this service.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckoutRequest {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub ticket_name: String,
    pub quantity: u32,
    pub unit_amount: i64,
    pub currency: String,
    #[serde(default)]
    pub buyer_name: Option<String>,
    #[serde(default)]
    pub buyer_email: Option<String>,
}

/// Response of `POST /api/v1/checkout`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutResponse {
    /// Where to send the buyer to complete payment
    pub checkout_url: String,
    pub order_id: OrderId,
}

/// Response of the status poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckoutStatus {
    /// The order finalized; the ticket is stable across re-polls
    Ready { ticket_id: TicketId },
    /// Payment not yet confirmed; poll again
    Pending,
    Failed { message: String },
    Expired { message: String },
    Cancelled { message: String },
    NotFound,
}

impl CheckoutStatus {
    /// Render a finalization outcome for the poll response
    pub fn from_finalization(outcome: Finalization) -> Self {
        match outcome {
            Finalization::Ready { ticket_id, .. } => CheckoutStatus::Ready { ticket_id },
            Finalization::Failed { reason } => Self::from_failure(reason),
        }
    }

    /// Render a terminal order snapshot without consulting the provider
    pub fn from_terminal_order(order: &Order) -> Option<Self> {
        match order.status {
            OrderStatus::Paid => order
                .resolution()
                .map(|(ticket_id, _)| CheckoutStatus::Ready { ticket_id }),
            OrderStatus::Failed => Some(Self::from_failure(FailureReason::PaymentFailed)),
            OrderStatus::Expired => Some(Self::from_failure(FailureReason::SessionExpired)),
            OrderStatus::Cancelled => Some(Self::from_failure(FailureReason::CheckoutCancelled)),
            OrderStatus::Pending => None,
        }
    }

    fn from_failure(reason: FailureReason) -> Self {
        let message = reason.message().to_string();
        match reason {
            FailureReason::SessionExpired => CheckoutStatus::Expired { message },
            FailureReason::CheckoutCancelled => CheckoutStatus::Cancelled { message },
            FailureReason::SoldOut
            | FailureReason::InvalidQuantity
            | FailureReason::PaymentFailed => CheckoutStatus::Failed { message },
        }
    }
}

/// Webhook acknowledgment body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self { received: true }
    }
}
