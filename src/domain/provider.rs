//! Payment-provider boundary types.
//!
//! The provider's loose JSON payloads are validated at the boundary and
//! modeled as tagged variants before they enter the core; nothing past this
//! module inspects raw provider JSON.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Order, OrderId, PaymentRef, SessionRef};

/// A verified, provider-originated signal about a checkout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The session completed and the payment succeeded
    SessionCompleted {
        session_ref: SessionRef,
        payment_ref: Option<PaymentRef>,
        /// Order reference carried in the session metadata
        order_id: OrderId,
    },
    /// The session expired before payment
    SessionExpired { session_ref: SessionRef },
}

/// Authoritative state of a checkout session, as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Session exists, payment not yet completed
    Open,
    /// Payment succeeded
    Paid { payment_ref: Option<PaymentRef> },
    /// Session expired without payment
    Expired,
}

/// Provider-supplied evidence that an order has been paid. Constructed only
/// from an authoritative status lookup or a signature-verified webhook event.
#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub session_ref: SessionRef,
    pub payment_ref: Option<PaymentRef>,
}

/// What the gateway needs to open a checkout session for an order
#[derive(Debug, Clone)]
pub struct CheckoutSpec {
    pub order_id: OrderId,
    pub ticket_name: String,
    pub quantity: u32,
    pub unit_amount: i64,
    pub currency: String,
    pub buyer_email: Option<String>,
}

impl CheckoutSpec {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.order_id,
            ticket_name: order.ticket_name.clone(),
            quantity: order.quantity,
            unit_amount: order.unit_amount,
            currency: order.currency.clone(),
            buyer_email: order.buyer_email.clone(),
        }
    }
}

/// A freshly created provider checkout session
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_ref: SessionRef,
    /// Where the buyer completes payment
    pub checkout_url: String,
}

// =============================================================================
// Wire envelope
// =============================================================================

/// Raw webhook envelope as delivered by the provider. Parsed only after the
/// signature over the raw body has been verified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Provider-side event id (used for logging, not dedup)
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookData {
    pub object: WebhookSession,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSession {
    /// The session reference
    pub id: String,
    #[serde(default)]
    pub payment_ref: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: WebhookMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookMetadata {
    #[serde(default)]
    pub order_id: Option<Uuid>,
}

/// Event types the service reacts to; anything else is acknowledged and
/// ignored.
pub const EVENT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_SESSION_EXPIRED: &str = "checkout.session.expired";

impl WebhookEnvelope {
    /// Validate the envelope into a typed provider event.
    ///
    /// Returns `Ok(None)` for event types this service does not consume.
    /// A completed event missing its order metadata or not actually marked
    /// paid is an error: the envelope claimed something it cannot back.
    pub fn into_provider_event(self) -> Result<Option<ProviderEvent>, EnvelopeError> {
        match self.event_type.as_str() {
            EVENT_SESSION_COMPLETED => {
                let session = self.data.object;
                let paid = session.payment_status.as_deref() == Some("paid");
                if !paid {
                    return Err(EnvelopeError::NotPaid {
                        session_ref: session.id,
                    });
                }
                let order_id = session
                    .metadata
                    .order_id
                    .ok_or(EnvelopeError::MissingOrderRef {
                        session_ref: session.id.clone(),
                    })?;
                Ok(Some(ProviderEvent::SessionCompleted {
                    session_ref: SessionRef::new(session.id),
                    payment_ref: session.payment_ref.map(PaymentRef::new),
                    order_id: OrderId::from_uuid(order_id),
                }))
            }
            EVENT_SESSION_EXPIRED => Ok(Some(ProviderEvent::SessionExpired {
                session_ref: SessionRef::new(self.data.object.id),
            })),
            _ => Ok(None),
        }
    }
}

/// Malformed-but-verified envelopes (signature passed, content did not)
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("completed event for session {session_ref} is not marked paid")]
    NotPaid { session_ref: String },
    #[error("completed event for session {session_ref} carries no order reference")]
    MissingOrderRef { session_ref: String },
}
