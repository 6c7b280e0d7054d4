//! Payment provider client.
//!
//! The core consumes the provider through the narrow `PaymentGateway` trait;
//! the REST implementation talks to a Stripe-shaped checkout-session API
//! with a bounded total timeout. Timeouts and transport failures are
//! transient: the order stays Pending and a later trigger retries
//! finalization from scratch, so nothing here retries in-process.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CheckoutSession, CheckoutSpec, PaymentRef, SessionRef, SessionState};

/// Errors from the payment provider boundary
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The bounded request timeout elapsed
    #[error("provider request timed out")]
    Timeout,

    /// Connection-level failure before a response arrived
    #[error("provider transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status
    #[error("provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    /// The provider answered 2xx with a body this client cannot read
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Transient failures leave the order Pending for the next trigger
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Transport(_) => true,
            GatewayError::Provider { status, .. } => *status >= 500,
            GatewayError::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// The two provider operations the core needs: opening a checkout session
/// and reading a session's authoritative status.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout session for an order. The order id travels in the
    /// session metadata so webhook events can find their order.
    async fn create_session(
        &self,
        spec: &CheckoutSpec,
    ) -> std::result::Result<CheckoutSession, GatewayError>;

    /// Fetch the authoritative state of a session
    async fn fetch_session(
        &self,
        session_ref: &SessionRef,
    ) -> std::result::Result<SessionState, GatewayError>;
}

// =============================================================================
// REST implementation
// =============================================================================

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    line_item: LineItem<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<&'a str>,
    metadata: SessionMetadata,
}

#[derive(Serialize)]
struct LineItem<'a> {
    name: &'a str,
    quantity: u32,
    unit_amount: i64,
    currency: &'a str,
}

#[derive(Serialize)]
struct SessionMetadata {
    order_id: uuid::Uuid,
}

#[derive(Deserialize)]
struct SessionResource {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default)]
    payment_ref: Option<String>,
}

/// HTTP client for the provider's checkout-session API
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestGateway {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> std::result::Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn read_resource(
        response: reqwest::Response,
    ) -> std::result::Result<SessionResource, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::Provider {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<SessionResource>()
            .await
            .map_err(GatewayError::from)
    }
}

#[async_trait]
impl PaymentGateway for RestGateway {
    async fn create_session(
        &self,
        spec: &CheckoutSpec,
    ) -> std::result::Result<CheckoutSession, GatewayError> {
        let body = CreateSessionBody {
            line_item: LineItem {
                name: &spec.ticket_name,
                quantity: spec.quantity,
                unit_amount: spec.unit_amount,
                currency: &spec.currency,
            },
            customer_email: spec.buyer_email.as_deref(),
            metadata: SessionMetadata {
                order_id: spec.order_id.0,
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let resource = Self::read_resource(response).await?;
        let checkout_url = resource.url.ok_or_else(|| {
            GatewayError::Decode("session resource is missing its checkout url".to_string())
        })?;

        Ok(CheckoutSession {
            session_ref: SessionRef::new(resource.id),
            checkout_url,
        })
    }

    async fn fetch_session(
        &self,
        session_ref: &SessionRef,
    ) -> std::result::Result<SessionState, GatewayError> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.base_url,
                session_ref.as_str()
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let resource = Self::read_resource(response).await?;

        // "complete" only counts once the payment itself is marked paid;
        // anything else the provider may report is still an open session.
        let state = match resource.status.as_deref() {
            Some("complete") if resource.payment_status.as_deref() == Some("paid") => {
                SessionState::Paid {
                    payment_ref: resource.payment_ref.map(PaymentRef::new),
                }
            }
            Some("expired") => SessionState::Expired,
            _ => SessionState::Open,
        };

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::Transport("reset".into()).is_transient());
        assert!(GatewayError::Provider {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!GatewayError::Provider {
            status: 404,
            message: String::new()
        }
        .is_transient());
        assert!(!GatewayError::Decode("bad json".into()).is_transient());
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let gw = RestGateway::new("https://pay.example.com/", "sk_test", Duration::from_secs(5))
            .unwrap();
        assert_eq!(gw.base_url, "https://pay.example.com");
    }
}
