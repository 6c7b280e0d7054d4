//! PostgreSQL-backed booking ledger.
//!
//! The two unique indexes are load-bearing: `bookings_ticket_id_key` makes
//! insertion the uniqueness authority for ticket tokens, and
//! `bookings_session_ref_key` resolves the same-order finalize race by
//! letting exactly one concurrent attempt's write succeed.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{
    Booking, BookingId, EventId, NewBooking, OrderId, PaymentRef, PaymentStatus, SessionRef,
    TicketId, UserId,
};
use crate::infra::{Result, StoreError};

const TICKET_ID_KEY: &str = "bookings_ticket_id_key";
const SESSION_REF_KEY: &str = "bookings_session_ref_key";

#[derive(sqlx::FromRow)]
struct BookingRow {
    booking_id: Uuid,
    order_id: Uuid,
    user_id: Uuid,
    event_id: Uuid,
    seats: i32,
    ticket_id: String,
    payment_status: String,
    session_ref: String,
    payment_ref: Option<String>,
    created_at: DateTime<Utc>,
}

fn row_to_booking(row: BookingRow) -> Result<Booking> {
    let payment_status = PaymentStatus::parse(&row.payment_status).ok_or_else(|| {
        StoreError::Database(sqlx::Error::Decode(
            format!(
                "unknown payment status {:?} for booking {}",
                row.payment_status, row.booking_id
            )
            .into(),
        ))
    })?;

    Ok(Booking {
        booking_id: BookingId::from_uuid(row.booking_id),
        order_id: OrderId::from_uuid(row.order_id),
        user_id: UserId::from_uuid(row.user_id),
        event_id: EventId::from_uuid(row.event_id),
        seats: row.seats.max(0) as u32,
        ticket_id: TicketId::new(row.ticket_id),
        payment_status,
        session_ref: SessionRef::new(row.session_ref),
        payment_ref: row.payment_ref.map(PaymentRef::new),
        created_at: row.created_at,
    })
}

const SELECT_BOOKING: &str = r#"
    SELECT booking_id, order_id, user_id, event_id, seats, ticket_id,
           payment_status, session_ref, payment_ref, created_at
    FROM bookings
"#;

/// PostgreSQL-backed booking ledger
pub struct PgBookingLedger {
    pool: PgPool,
}

impl PgBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl crate::infra::BookingLedger for PgBookingLedger {
    async fn create(&self, booking: &NewBooking) -> Result<Booking> {
        let inserted: std::result::Result<(DateTime<Utc>,), sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO bookings (
                booking_id, order_id, user_id, event_id, seats,
                ticket_id, payment_status, session_ref, payment_ref
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING created_at
            "#,
        )
        .bind(booking.booking_id.0)
        .bind(booking.order_id.0)
        .bind(booking.user_id.0)
        .bind(booking.event_id.0)
        .bind(booking.seats as i32)
        .bind(booking.ticket_id.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.session_ref.as_str())
        .bind(booking.payment_ref.as_ref().map(|p| p.as_str()))
        .fetch_one(&self.pool)
        .await;

        let (created_at,) = match inserted {
            Ok(row) => row,
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(TICKET_ID_KEY) => {
                return Err(StoreError::DuplicateTicket(booking.ticket_id.clone()));
            }
            Err(sqlx::Error::Database(db)) if db.constraint() == Some(SESSION_REF_KEY) => {
                return Err(StoreError::DuplicateSession(booking.session_ref.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Booking {
            booking_id: booking.booking_id,
            order_id: booking.order_id,
            user_id: booking.user_id,
            event_id: booking.event_id,
            seats: booking.seats,
            ticket_id: booking.ticket_id.clone(),
            payment_status: booking.payment_status,
            session_ref: booking.session_ref.clone(),
            payment_ref: booking.payment_ref.clone(),
            created_at,
        })
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("{SELECT_BOOKING} WHERE booking_id = $1"))
                .bind(booking_id.0)
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_booking).transpose()
    }

    async fn get_by_session_ref(&self, session_ref: &SessionRef) -> Result<Option<Booking>> {
        let row: Option<BookingRow> =
            sqlx::query_as(&format!("{SELECT_BOOKING} WHERE session_ref = $1"))
                .bind(session_ref.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(row_to_booking).transpose()
    }
}
