//! PostgreSQL-backed order ledger.
//!
//! Status transitions are gated on `status = 'pending'` inside the UPDATE
//! itself; a `false` return means the order was already terminal and the
//! caller must re-read rather than overwrite.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{
    BookingId, EventId, Order, OrderId, OrderStatus, PaymentRef, SessionRef, TicketId, UserId,
};
use crate::infra::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct OrderRow {
    order_id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    ticket_name: String,
    quantity: i32,
    unit_amount: i64,
    currency: String,
    buyer_name: Option<String>,
    buyer_email: Option<String>,
    session_ref: Option<String>,
    payment_ref: Option<String>,
    status: String,
    booking_id: Option<Uuid>,
    ticket_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn row_to_order(row: OrderRow) -> Result<Order> {
    let status = OrderStatus::parse(&row.status).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!("unknown order status {:?} for order {}", row.status, row.order_id).into(),
        ))
    })?;

    Ok(Order {
        order_id: OrderId::from_uuid(row.order_id),
        event_id: EventId::from_uuid(row.event_id),
        user_id: UserId::from_uuid(row.user_id),
        ticket_name: row.ticket_name,
        quantity: row.quantity.max(0) as u32,
        unit_amount: row.unit_amount,
        currency: row.currency,
        buyer_name: row.buyer_name,
        buyer_email: row.buyer_email,
        session_ref: row.session_ref.map(SessionRef::new),
        payment_ref: row.payment_ref.map(PaymentRef::new),
        status,
        booking_id: row.booking_id.map(BookingId::from_uuid),
        ticket_id: row.ticket_id.map(TicketId::new),
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

const SELECT_ORDER: &str = r#"
    SELECT order_id, event_id, user_id, ticket_name, quantity, unit_amount,
           currency, buyer_name, buyer_email, session_ref, payment_ref,
           status, booking_id, ticket_id, created_at, updated_at
    FROM orders
"#;

/// PostgreSQL-backed order ledger
pub struct PgOrderLedger {
    pool: PgPool,
}

impl PgOrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl crate::infra::OrderLedger for PgOrderLedger {
    async fn create(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, event_id, user_id, ticket_name, quantity, unit_amount,
                currency, buyer_name, buyer_email, session_ref, payment_ref,
                status, booking_id, ticket_id, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16
            )
            "#,
        )
        .bind(order.order_id.0)
        .bind(order.event_id.0)
        .bind(order.user_id.0)
        .bind(&order.ticket_name)
        .bind(order.quantity as i32)
        .bind(order.unit_amount)
        .bind(&order.currency)
        .bind(&order.buyer_name)
        .bind(&order.buyer_email)
        .bind(order.session_ref.as_ref().map(|s| s.as_str()))
        .bind(order.payment_ref.as_ref().map(|p| p.as_str()))
        .bind(order.status.as_str())
        .bind(order.booking_id.map(|b| b.0))
        .bind(order.ticket_id.as_ref().map(|t| t.as_str()))
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} WHERE order_id = $1"))
                .bind(order_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_order).transpose()
    }

    async fn get_by_session_ref(&self, session_ref: &SessionRef) -> Result<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{SELECT_ORDER} WHERE session_ref = $1"))
                .bind(session_ref.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_order).transpose()
    }

    async fn attach_session(&self, order_id: OrderId, session_ref: &SessionRef) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET session_ref = $2, updated_at = NOW()
            WHERE order_id = $1
            "#,
        )
        .bind(order_id.0)
        .bind(session_ref.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn transition(&self, order_id: OrderId, to: OrderStatus) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE order_id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id.0)
        .bind(to.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit_paid(
        &self,
        order_id: OrderId,
        booking_id: BookingId,
        ticket_id: &TicketId,
        payment_ref: Option<PaymentRef>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'paid', booking_id = $2, ticket_id = $3,
                payment_ref = $4, updated_at = NOW()
            WHERE order_id = $1 AND status = 'pending'
            "#,
        )
        .bind(order_id.0)
        .bind(booking_id.0)
        .bind(ticket_id.as_str())
        .bind(payment_ref.map(|p| p.0))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
