//! Common test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use boxoffice::checkout::{webhook, GatewayError, PaymentGateway};
use boxoffice::domain::{
    Booking, CheckoutSession, CheckoutSpec, EventId, NewBooking, Order, OrderId, OrderStatus,
    SeatEvent, SessionRef, SessionState, UserId,
};
use boxoffice::infra::{
    BookingLedger, InventoryStore, MemoryBookingLedger, MemoryInventoryStore, MemoryOrderLedger,
    OrderLedger, StoreError,
};
use boxoffice::server::AppState;

/// Shared webhook secret used across the test suite
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test buyer
pub fn test_user_id() -> UserId {
    UserId::from_uuid(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
}

/// A controllable in-memory payment provider. `create_session` registers an
/// Open session named after the order; tests flip the state to drive the
/// poll trigger.
#[derive(Default)]
pub struct FakeGateway {
    sessions: Mutex<HashMap<String, SessionState>>,
    /// When set, every call fails with a timeout (provider outage)
    outage: Mutex<bool>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_ref_for(order_id: OrderId) -> SessionRef {
        SessionRef::new(format!("cs_{}", order_id.0.simple()))
    }

    pub async fn set_state(&self, session_ref: &SessionRef, state: SessionState) {
        self.sessions
            .lock()
            .await
            .insert(session_ref.as_str().to_string(), state);
    }

    pub async fn set_outage(&self, outage: bool) {
        *self.outage.lock().await = outage;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_session(
        &self,
        spec: &CheckoutSpec,
    ) -> Result<CheckoutSession, GatewayError> {
        if *self.outage.lock().await {
            return Err(GatewayError::Timeout);
        }
        let session_ref = Self::session_ref_for(spec.order_id);
        self.sessions
            .lock()
            .await
            .insert(session_ref.as_str().to_string(), SessionState::Open);
        Ok(CheckoutSession {
            checkout_url: format!("https://pay.example.com/c/{}", session_ref),
            session_ref,
        })
    }

    async fn fetch_session(
        &self,
        session_ref: &SessionRef,
    ) -> Result<SessionState, GatewayError> {
        if *self.outage.lock().await {
            return Err(GatewayError::Timeout);
        }
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session_ref.as_str())
            .cloned()
            .unwrap_or(SessionState::Open))
    }
}

/// A booking ledger whose writes always fail fatally, for compensation tests
pub struct FailingBookingLedger;

#[async_trait]
impl BookingLedger for FailingBookingLedger {
    async fn create(&self, _booking: &NewBooking) -> boxoffice::Result<Booking> {
        Err(StoreError::Database(sqlx::Error::PoolClosed))
    }

    async fn get(
        &self,
        _booking_id: boxoffice::BookingId,
    ) -> boxoffice::Result<Option<Booking>> {
        Ok(None)
    }

    async fn get_by_session_ref(
        &self,
        _session_ref: &SessionRef,
    ) -> boxoffice::Result<Option<Booking>> {
        Ok(None)
    }
}

/// The in-memory world a test runs against, with concrete handles kept for
/// assertions alongside the trait-object `AppState`.
pub struct TestWorld {
    pub state: AppState,
    pub inventory: Arc<MemoryInventoryStore>,
    pub orders: Arc<MemoryOrderLedger>,
    pub bookings: Arc<MemoryBookingLedger>,
    pub gateway: Arc<FakeGateway>,
}

impl TestWorld {
    pub fn new() -> Self {
        let inventory = Arc::new(MemoryInventoryStore::new());
        let orders = Arc::new(MemoryOrderLedger::new());
        let bookings = Arc::new(MemoryBookingLedger::new());
        let gateway = Arc::new(FakeGateway::new());

        let state = AppState::new(
            inventory.clone(),
            orders.clone(),
            bookings.clone(),
            gateway.clone(),
            WEBHOOK_SECRET,
        );

        Self {
            state,
            inventory,
            orders,
            bookings,
            gateway,
        }
    }

    /// Seed a seating event with the given capacity
    pub async fn seed_event(&self, total_seats: u32) -> SeatEvent {
        let event = SeatEvent {
            event_id: EventId::new(),
            name: "Test Gig".to_string(),
            total_seats,
            booked_seats: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.inventory.insert_event(&event).await.unwrap();
        event
    }

    /// Seed a Pending order with an attached provider session, as checkout
    /// creation would leave it.
    pub async fn seed_pending_order(&self, event: &SeatEvent, quantity: u32) -> Order {
        let now = Utc::now();
        let order_id = OrderId::new();
        let session_ref = FakeGateway::session_ref_for(order_id);
        let order = Order {
            order_id,
            event_id: event.event_id,
            user_id: test_user_id(),
            ticket_name: "General Admission".to_string(),
            quantity,
            unit_amount: 2500,
            currency: "usd".to_string(),
            buyer_name: Some("Ada Lovelace".to_string()),
            buyer_email: Some("ada@example.com".to_string()),
            session_ref: Some(session_ref.clone()),
            payment_ref: None,
            status: OrderStatus::Pending,
            booking_id: None,
            ticket_id: None,
            created_at: now,
            updated_at: now,
        };
        self.orders.create(&order).await.unwrap();
        self.gateway.set_state(&session_ref, SessionState::Open).await;
        order
    }

    pub async fn booked_seats(&self, event_id: EventId) -> u32 {
        self.inventory
            .get_event(event_id)
            .await
            .unwrap()
            .unwrap()
            .booked_seats
    }

    pub async fn order_status(&self, order_id: OrderId) -> OrderStatus {
        self.orders.get(order_id).await.unwrap().unwrap().status
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Sign a webhook body the way the provider would, timestamped now
pub fn sign_webhook(body: &str) -> String {
    webhook::sign(WEBHOOK_SECRET.as_bytes(), Utc::now().timestamp(), body.as_bytes())
}

/// A `checkout.session.completed` delivery body for an order
pub fn completed_webhook_body(order: &Order) -> String {
    let session_ref = order.session_ref.as_ref().expect("order has a session");
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_ref.as_str(),
                "payment_ref": format!("pi_{}", Uuid::new_v4().simple()),
                "payment_status": "paid",
                "metadata": { "order_id": order.order_id.0 }
            }
        }
    })
    .to_string()
}

/// A `checkout.session.expired` delivery body for an order
pub fn expired_webhook_body(order: &Order) -> String {
    let session_ref = order.session_ref.as_ref().expect("order has a session");
    serde_json::json!({
        "id": format!("evt_{}", Uuid::new_v4().simple()),
        "type": "checkout.session.expired",
        "data": {
            "object": { "id": session_ref.as_str() }
        }
    })
    .to_string()
}
