//! Health and readiness endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::domain::EventId;
use crate::infra::InventoryStore;
use crate::server::AppState;

/// Liveness check
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "boxoffice",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check: verifies the store answers at all.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state
        .inventory
        .get_event(EventId::from_uuid(Uuid::nil()))
        .await
    {
        Ok(_) => Ok(Json(serde_json::json!({
            "status": "ready",
            "store": "connected",
        }))),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            format!("Store unavailable: {}", e),
        )),
    }
}
