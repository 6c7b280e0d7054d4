//! Status poll: the client-driven completion trigger.
//!
//! If the order is already resolved this answers from the ledger alone.
//! Otherwise it asks the provider for the session's authoritative state and
//! only a provider-reported "paid" invokes finalization.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::{debug, instrument, warn};

use crate::api::error::ApiError;
use crate::api::types::CheckoutStatus;
use crate::checkout::PaymentGateway;
use crate::domain::{OrderStatus, PaymentProof, SessionRef, SessionState};
use crate::infra::OrderLedger;
use crate::server::AppState;

#[instrument(skip(state), fields(session_ref = %session_ref))]
pub async fn session_status(
    State(state): State<AppState>,
    Path(session_ref): Path<String>,
) -> Result<(StatusCode, Json<CheckoutStatus>), ApiError> {
    let session_ref = SessionRef::new(session_ref);

    let order = match state.orders.get_by_session_ref(&session_ref).await? {
        Some(order) => order,
        None => {
            debug!("no order for session");
            return Ok((StatusCode::NOT_FOUND, Json(CheckoutStatus::NotFound)));
        }
    };

    // Already terminal: answer from the ledger, no provider round trip.
    if let Some(response) = CheckoutStatus::from_terminal_order(&order) {
        return Ok((StatusCode::OK, Json(response)));
    }

    // Still pending: the provider is the authority on payment state. A
    // transient provider failure surfaces as 503 and leaves the order
    // Pending for the next poll or the webhook.
    let response = match state.gateway.fetch_session(&session_ref).await? {
        SessionState::Paid { payment_ref } => {
            let proof = PaymentProof {
                session_ref: session_ref.clone(),
                payment_ref,
            };
            let outcome = state.finalizer.finalize(&order, &proof).await?;
            CheckoutStatus::from_finalization(outcome)
        }
        SessionState::Open => CheckoutStatus::Pending,
        SessionState::Expired => {
            if !state
                .orders
                .transition(order.order_id, OrderStatus::Expired)
                .await?
            {
                // Lost to a concurrent transition; report what stuck.
                warn!(order_id = %order.order_id, "expiry transition lost, re-reading");
                if let Some(fresh) = state.orders.get(order.order_id).await? {
                    if let Some(response) = CheckoutStatus::from_terminal_order(&fresh) {
                        return Ok((StatusCode::OK, Json(response)));
                    }
                }
            }
            CheckoutStatus::Expired {
                message: "checkout session expired".to_string(),
            }
        }
    };

    Ok((StatusCode::OK, Json(response)))
}
