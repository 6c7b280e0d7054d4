//! In-memory implementations of the Box Office stores.
//!
//! Backing store for tests and local development. The conditional update
//! semantics match the PostgreSQL implementations: the capacity check and
//! the increment happen under one lock acquisition, so `try_reserve` is
//! linearizable per event, and status transitions are gated on the current
//! status inside the same critical section that applies them.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::{
    Booking, BookingId, EventId, NewBooking, Order, OrderId, OrderStatus, PaymentRef, SeatEvent,
    SessionRef, TicketId,
};

use super::{BookingLedger, InventoryStore, OrderLedger, Result, StoreError};

/// In-memory seat inventory
#[derive(Default)]
pub struct MemoryInventoryStore {
    events: Mutex<HashMap<EventId, SeatEvent>>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn try_reserve(&self, event_id: EventId, seats: u32) -> Result<SeatEvent> {
        let mut events = self.events.lock().await;
        let event = events
            .get_mut(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;

        if event.booked_seats.saturating_add(seats) > event.total_seats {
            return Err(StoreError::CapacityExceeded {
                event_id,
                requested: seats,
                available: event.seats_available(),
            });
        }

        event.booked_seats += seats;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn release(&self, event_id: EventId, seats: u32) -> Result<()> {
        let mut events = self.events.lock().await;
        let event = events
            .get_mut(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;

        event.booked_seats = event.booked_seats.saturating_sub(seats);
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_event(&self, event: &SeatEvent) -> Result<()> {
        let mut events = self.events.lock().await;
        events.insert(event.event_id, event.clone());
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<SeatEvent>> {
        let events = self.events.lock().await;
        Ok(events.get(&event_id).cloned())
    }
}

/// In-memory order ledger
#[derive(Default)]
pub struct MemoryOrderLedger {
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl MemoryOrderLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OrderLedger for MemoryOrderLedger {
    async fn create(&self, order: &Order) -> Result<()> {
        let mut orders = self.orders.lock().await;
        orders.insert(order.order_id, order.clone());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.lock().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn get_by_session_ref(&self, session_ref: &SessionRef) -> Result<Option<Order>> {
        let orders = self.orders.lock().await;
        Ok(orders
            .values()
            .find(|o| o.session_ref.as_ref() == Some(session_ref))
            .cloned())
    }

    async fn attach_session(&self, order_id: OrderId, session_ref: &SessionRef) -> Result<()> {
        let mut orders = self.orders.lock().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.session_ref = Some(session_ref.clone());
        order.updated_at = Utc::now();
        Ok(())
    }

    async fn transition(&self, order_id: OrderId, to: OrderStatus) -> Result<bool> {
        let mut orders = self.orders.lock().await;
        let order = match orders.get_mut(&order_id) {
            Some(order) => order,
            None => return Ok(false),
        };

        if !order.status.can_transition(to) {
            return Ok(false);
        }
        order.status = to;
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn commit_paid(
        &self,
        order_id: OrderId,
        booking_id: BookingId,
        ticket_id: &TicketId,
        payment_ref: Option<PaymentRef>,
    ) -> Result<bool> {
        let mut orders = self.orders.lock().await;
        let order = match orders.get_mut(&order_id) {
            Some(order) => order,
            None => return Ok(false),
        };

        if !order.status.can_transition(OrderStatus::Paid) {
            return Ok(false);
        }
        order.status = OrderStatus::Paid;
        order.booking_id = Some(booking_id);
        order.ticket_id = Some(ticket_id.clone());
        order.payment_ref = payment_ref;
        order.updated_at = Utc::now();
        Ok(true)
    }
}

/// In-memory booking ledger
#[derive(Default)]
pub struct MemoryBookingLedger {
    bookings: Mutex<Vec<Booking>>,
}

impl MemoryBookingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bookings written, for test assertions
    pub async fn len(&self) -> usize {
        self.bookings.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.bookings.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl BookingLedger for MemoryBookingLedger {
    async fn create(&self, booking: &NewBooking) -> Result<Booking> {
        let mut bookings = self.bookings.lock().await;

        if bookings.iter().any(|b| b.ticket_id == booking.ticket_id) {
            return Err(StoreError::DuplicateTicket(booking.ticket_id.clone()));
        }
        if bookings.iter().any(|b| b.session_ref == booking.session_ref) {
            return Err(StoreError::DuplicateSession(booking.session_ref.clone()));
        }

        let created = Booking {
            booking_id: booking.booking_id,
            order_id: booking.order_id,
            user_id: booking.user_id,
            event_id: booking.event_id,
            seats: booking.seats,
            ticket_id: booking.ticket_id.clone(),
            payment_status: booking.payment_status,
            session_ref: booking.session_ref.clone(),
            payment_ref: booking.payment_ref.clone(),
            created_at: Utc::now(),
        };
        bookings.push(created.clone());
        Ok(created)
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let bookings = self.bookings.lock().await;
        Ok(bookings.iter().find(|b| b.booking_id == booking_id).cloned())
    }

    async fn get_by_session_ref(&self, session_ref: &SessionRef) -> Result<Option<Booking>> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .iter()
            .find(|b| &b.session_ref == session_ref)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentStatus;
    use uuid::Uuid;

    fn seat_event(total: u32) -> SeatEvent {
        SeatEvent {
            event_id: EventId::new(),
            name: "Test Gig".to_string(),
            total_seats: total,
            booked_seats: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn new_booking(session: &str, ticket: &str) -> NewBooking {
        NewBooking {
            booking_id: BookingId::new(),
            order_id: OrderId::new(),
            user_id: crate::domain::UserId::from_uuid(Uuid::new_v4()),
            event_id: EventId::new(),
            seats: 1,
            ticket_id: TicketId::new(ticket),
            payment_status: PaymentStatus::Paid,
            session_ref: SessionRef::new(session),
            payment_ref: None,
        }
    }

    #[tokio::test]
    async fn reserve_rejects_when_over_capacity() {
        let store = MemoryInventoryStore::new();
        let event = seat_event(2);
        store.insert_event(&event).await.unwrap();

        store.try_reserve(event.event_id, 2).await.unwrap();
        let err = store.try_reserve(event.event_id, 1).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::CapacityExceeded { available: 0, requested: 1, .. }
        ));

        let stored = store.get_event(event.event_id).await.unwrap().unwrap();
        assert_eq!(stored.booked_seats, 2);
    }

    #[tokio::test]
    async fn release_floors_at_zero() {
        let store = MemoryInventoryStore::new();
        let event = seat_event(5);
        store.insert_event(&event).await.unwrap();

        store.try_reserve(event.event_id, 1).await.unwrap();
        store.release(event.event_id, 3).await.unwrap();

        let stored = store.get_event(event.event_id).await.unwrap().unwrap();
        assert_eq!(stored.booked_seats, 0);
    }

    #[tokio::test]
    async fn booking_duplicates_are_distinguishable() {
        let ledger = MemoryBookingLedger::new();
        ledger.create(&new_booking("cs_1", "TKT-A")).await.unwrap();

        let err = ledger.create(&new_booking("cs_2", "TKT-A")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTicket(_)));

        let err = ledger.create(&new_booking("cs_1", "TKT-B")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateSession(_)));

        assert_eq!(ledger.len().await, 1);
    }

    #[tokio::test]
    async fn transition_refuses_terminal_orders() {
        let ledger = MemoryOrderLedger::new();
        let order = Order {
            order_id: OrderId::new(),
            event_id: EventId::new(),
            user_id: crate::domain::UserId::from_uuid(Uuid::new_v4()),
            ticket_name: "GA".to_string(),
            quantity: 1,
            unit_amount: 1000,
            currency: "usd".to_string(),
            buyer_name: None,
            buyer_email: None,
            session_ref: None,
            payment_ref: None,
            status: OrderStatus::Pending,
            booking_id: None,
            ticket_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ledger.create(&order).await.unwrap();

        assert!(ledger.transition(order.order_id, OrderStatus::Expired).await.unwrap());
        assert!(!ledger.transition(order.order_id, OrderStatus::Failed).await.unwrap());

        let stored = ledger.get(order.order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Expired);
    }
}
