//! Structured API error responses with error codes
//!
//! Machine-readable error codes plus human-readable messages, consistent
//! across endpoints. User-visible failure is always a terse status; internal
//! detail stays in the logs.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::checkout::{FinalizeError, GatewayError};
use crate::infra::StoreError;

/// Error codes for API responses
///
/// These codes are stable and can be used by clients for programmatic error
/// handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation
    /// Request body is malformed
    InvalidRequestBody,
    /// Field value is invalid
    InvalidFieldValue,

    // Resources
    /// Requested resource not found
    ResourceNotFound,
    /// Seating event not found
    EventNotFound,
    /// Order not found
    OrderNotFound,

    // Conflicts
    /// Resource already exists
    AlreadyExists,
    /// Requested seats exceed remaining capacity
    SoldOut,

    // Webhook
    /// Webhook signature missing or invalid
    InvalidSignature,

    // Upstream
    /// Payment provider rejected the request
    ProviderRejected,
    /// Payment provider unreachable or timing out
    ProviderUnavailable,

    // Infrastructure
    /// Database operation failed
    DatabaseError,
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidFieldValue => StatusCode::BAD_REQUEST,
            ErrorCode::ResourceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::EventNotFound => StatusCode::NOT_FOUND,
            ErrorCode::OrderNotFound => StatusCode::NOT_FOUND,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::SoldOut => StatusCode::CONFLICT,
            ErrorCode::InvalidSignature => StatusCode::BAD_REQUEST,
            ErrorCode::ProviderRejected => StatusCode::BAD_GATEWAY,
            ErrorCode::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code_str = match self {
            ErrorCode::InvalidRequestBody => "INVALID_REQUEST_BODY",
            ErrorCode::InvalidFieldValue => "INVALID_FIELD_VALUE",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::EventNotFound => "EVENT_NOT_FOUND",
            ErrorCode::OrderNotFound => "ORDER_NOT_FOUND",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::SoldOut => "SOLD_OUT",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::ProviderRejected => "PROVIDER_REJECTED",
            ErrorCode::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{}", code_str)
    }
}

/// Structured error response for API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error details
    pub error: ErrorDetails,
}

/// Detailed error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Machine-readable error code
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Related resource ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ApiError {
    /// Create a new API error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetails {
                code,
                message: message.into(),
                resource_id: None,
            },
        }
    }

    /// Set related resource ID
    pub fn with_resource_id(mut self, id: impl Into<String>) -> Self {
        self.error.resource_id = Some(id.into());
        self
    }

    /// Get the HTTP status code
    pub fn status(&self) -> StatusCode {
        self.error.code.http_status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code_str = self.error.code.to_string();
        let mut response = (status, Json(self)).into_response();

        if let Ok(code_value) = axum::http::HeaderValue::from_str(&code_str) {
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-error-code"),
                code_value,
            );
        }

        response
    }
}

// =============================================================================
// Conversions from library errors
// =============================================================================

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => {
                ApiError::new(ErrorCode::DatabaseError, format!("Database error: {}", e))
            }
            StoreError::EventNotFound(id) => {
                ApiError::new(ErrorCode::EventNotFound, format!("Event not found: {}", id))
                    .with_resource_id(id.to_string())
            }
            StoreError::OrderNotFound(id) => {
                ApiError::new(ErrorCode::OrderNotFound, format!("Order not found: {}", id))
                    .with_resource_id(id.to_string())
            }
            StoreError::BookingNotFound(session_ref) => ApiError::new(
                ErrorCode::ResourceNotFound,
                format!("Booking not found for session: {}", session_ref),
            ),
            StoreError::CapacityExceeded { event_id, .. } => {
                ApiError::new(ErrorCode::SoldOut, "not enough seats")
                    .with_resource_id(event_id.to_string())
            }
            StoreError::DuplicateTicket(_) | StoreError::DuplicateSession(_) => {
                // Ledger-level conflicts are consumed by the finalizer; one
                // escaping this far is an internal defect, not a 409.
                ApiError::new(ErrorCode::InternalError, "conflicting ledger write")
            }
            StoreError::InvalidTransition { order_id, .. } => {
                ApiError::new(ErrorCode::AlreadyExists, "order is already resolved")
                    .with_resource_id(order_id.to_string())
            }
        }
    }
}

impl From<FinalizeError> for ApiError {
    fn from(err: FinalizeError) -> Self {
        match err {
            FinalizeError::Store(e) => e.into(),
            FinalizeError::TicketMintExhausted { order_id, .. } => {
                ApiError::new(ErrorCode::InternalError, "could not issue a ticket")
                    .with_resource_id(order_id.to_string())
            }
            FinalizeError::MissingResolution(order_id)
            | FinalizeError::SessionConflict { order_id, .. } => {
                ApiError::new(ErrorCode::InternalError, "order state needs reconciliation")
                    .with_resource_id(order_id.to_string())
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        if err.is_transient() {
            ApiError::new(ErrorCode::ProviderUnavailable, "payment provider unavailable")
        } else {
            ApiError::new(ErrorCode::ProviderRejected, format!("provider error: {}", err))
        }
    }
}

/// Create a validation error with field details
pub fn validation_error(field: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(ErrorCode::InvalidFieldValue, message.into()).with_resource_id(field.to_string())
}

// =============================================================================
// Tests
// =============================================================================
