//! REST API for Box Office

pub mod error;
pub mod handlers;
pub mod types;

use axum::routing::{get, post};
use axum::Router;

use crate::server::AppState;

/// Versioned API router, nested under `/api/v1` by the server
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(handlers::checkout::create_checkout))
        .route(
            "/checkout/sessions/:session_ref/status",
            get(handlers::status::session_status),
        )
        .route("/webhook", post(handlers::webhook::provider_webhook))
}
