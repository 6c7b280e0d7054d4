//! Webhook push: the provider-driven completion trigger.
//!
//! The signature over the raw body is verified before anything is parsed.
//! Past that point this handler acknowledges receipt no matter what happens
//! internally: a finalize failure here is logged for reconciliation, never
//! propagated as a transport error, so the provider's retry storm cannot
//! amplify load.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::api::error::{ApiError, ErrorCode};
use crate::api::types::WebhookAck;
use crate::checkout::webhook::{verify, SIGNATURE_HEADER, SIGNATURE_TOLERANCE_SECS};
use crate::domain::{
    OrderId, OrderStatus, PaymentProof, PaymentRef, ProviderEvent, SessionRef, WebhookEnvelope,
};
use crate::infra::OrderLedger;
use crate::server::AppState;

#[instrument(skip_all)]
pub async fn provider_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidSignature, "signature header missing"))?;

    verify(
        state.webhook_secret.as_bytes(),
        signature,
        body.as_bytes(),
        Utc::now().timestamp(),
        SIGNATURE_TOLERANCE_SECS,
    )
    .map_err(|e| ApiError::new(ErrorCode::InvalidSignature, e.to_string()))?;

    let envelope: WebhookEnvelope = serde_json::from_str(&body).map_err(|e| {
        ApiError::new(ErrorCode::InvalidRequestBody, format!("unreadable envelope: {}", e))
    })?;

    let delivery_id = envelope.id.clone();
    let event = match envelope.into_provider_event() {
        Ok(Some(event)) => event,
        Ok(None) => {
            info!(%delivery_id, "ignoring unhandled event type");
            return Ok(Json(WebhookAck::ok()));
        }
        Err(e) => {
            // Signature was valid but the content cannot be acted on. Ack so
            // the provider stops retrying a delivery that will never work.
            warn!(%delivery_id, error = %e, "unusable provider event");
            return Ok(Json(WebhookAck::ok()));
        }
    };

    match event {
        ProviderEvent::SessionCompleted {
            session_ref,
            payment_ref,
            order_id,
        } => {
            handle_session_completed(&state, session_ref, payment_ref, order_id).await;
        }
        ProviderEvent::SessionExpired { session_ref } => {
            handle_session_expired(&state, session_ref).await;
        }
    }

    Ok(Json(WebhookAck::ok()))
}

async fn handle_session_completed(
    state: &AppState,
    session_ref: SessionRef,
    payment_ref: Option<PaymentRef>,
    order_id: OrderId,
) {
    let order = match state.orders.get(order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(%order_id, %session_ref, "completed session references unknown order");
            return;
        }
        Err(e) => {
            error!(%order_id, error = %e, "could not load order for completed session");
            return;
        }
    };

    let proof = PaymentProof {
        session_ref,
        payment_ref,
    };
    match state.finalizer.finalize(&order, &proof).await {
        Ok(outcome) => {
            info!(%order_id, ?outcome, "webhook finalization finished");
        }
        Err(e) => {
            // Logged with full context for reconciliation; the delivery is
            // still acknowledged.
            error!(
                %order_id,
                event_id = %order.event_id,
                quantity = order.quantity,
                error = %e,
                "webhook finalization failed"
            );
        }
    }
}

async fn handle_session_expired(state: &AppState, session_ref: SessionRef) {
    let order = match state.orders.get_by_session_ref(&session_ref).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(%session_ref, "expired session references unknown order");
            return;
        }
        Err(e) => {
            error!(%session_ref, error = %e, "could not load order for expired session");
            return;
        }
    };

    // Expiry only moves a still-Pending order; inventory is untouched.
    match state
        .orders
        .transition(order.order_id, OrderStatus::Expired)
        .await
    {
        Ok(true) => info!(order_id = %order.order_id, "order expired"),
        Ok(false) => {
            info!(order_id = %order.order_id, status = %order.status, "expiry ignored, order not pending")
        }
        Err(e) => error!(order_id = %order.order_id, error = %e, "could not expire order"),
    }
}
