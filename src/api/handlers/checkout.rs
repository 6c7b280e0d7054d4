//! Checkout creation handler.
//!
//! Creates the Pending order BEFORE contacting the payment provider, so
//! every provider session maps to exactly one pre-existing order.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::api::error::{validation_error, ApiError, ErrorCode};
use crate::api::types::{CreateCheckoutRequest, CreateCheckoutResponse};
use crate::checkout::PaymentGateway;
use crate::domain::{CheckoutSpec, EventId, Order, OrderId, OrderStatus, UserId};
use crate::infra::{InventoryStore, OrderLedger};
use crate::server::AppState;

#[instrument(skip(state, payload), fields(event_id = %payload.event_id, quantity = payload.quantity))]
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<Json<CreateCheckoutResponse>, ApiError> {
    if payload.quantity == 0 {
        return Err(validation_error("quantity", "quantity must be at least 1"));
    }
    if payload.unit_amount < 1 {
        return Err(validation_error("unit_amount", "unit_amount must be at least 1"));
    }
    if payload.ticket_name.trim().is_empty() {
        return Err(validation_error("ticket_name", "ticket_name must not be empty"));
    }
    if payload.currency.trim().is_empty() {
        return Err(validation_error("currency", "currency must not be empty"));
    }

    let event_id = EventId::from_uuid(payload.event_id);
    let event = state
        .inventory
        .get_event(event_id)
        .await?
        .ok_or_else(|| {
            ApiError::new(ErrorCode::EventNotFound, format!("Event not found: {}", event_id))
                .with_resource_id(event_id.to_string())
        })?;

    // Advisory check: the capacity-checked reservation at finalization is
    // the authority under concurrency.
    if !event.can_fit(payload.quantity) {
        return Err(
            ApiError::new(ErrorCode::SoldOut, "not enough seats")
                .with_resource_id(event_id.to_string()),
        );
    }

    let now = Utc::now();
    let order = Order {
        order_id: OrderId::new(),
        event_id,
        user_id: UserId::from_uuid(payload.user_id),
        ticket_name: payload.ticket_name,
        quantity: payload.quantity,
        unit_amount: payload.unit_amount,
        currency: payload.currency,
        buyer_name: payload.buyer_name,
        buyer_email: payload.buyer_email,
        session_ref: None,
        payment_ref: None,
        status: OrderStatus::Pending,
        booking_id: None,
        ticket_id: None,
        created_at: now,
        updated_at: now,
    };
    state.orders.create(&order).await?;

    let session = match state
        .gateway
        .create_session(&CheckoutSpec::for_order(&order))
        .await
    {
        Ok(session) => session,
        Err(e) => {
            warn!(order_id = %order.order_id, error = %e, "provider session creation failed");
            // Don't leave a Pending order with no session behind it.
            if let Err(cancel_err) = state
                .orders
                .transition(order.order_id, OrderStatus::Cancelled)
                .await
            {
                warn!(order_id = %order.order_id, error = %cancel_err, "could not cancel order");
            }
            return Err(e.into());
        }
    };

    state
        .orders
        .attach_session(order.order_id, &session.session_ref)
        .await?;

    info!(
        order_id = %order.order_id,
        session_ref = %session.session_ref,
        "checkout session created"
    );

    Ok(Json(CreateCheckoutResponse {
        checkout_url: session.checkout_url,
        order_id: order.order_id,
    }))
}
