//! PostgreSQL-backed inventory store.
//!
//! The reservation is a single conditional UPDATE evaluated by the server:
//! the capacity check and the increment happen in one round trip, so
//! concurrent callers racing for the last seats are linearized by the row
//! lock rather than by any in-process coordination.

use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::domain::{EventId, SeatEvent};
use crate::infra::{Result, StoreError};

#[derive(sqlx::FromRow)]
struct SeatEventRow {
    event_id: Uuid,
    name: String,
    total_seats: i32,
    booked_seats: i32,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

fn row_to_event(row: SeatEventRow) -> SeatEvent {
    SeatEvent {
        event_id: EventId::from_uuid(row.event_id),
        name: row.name,
        total_seats: row.total_seats.max(0) as u32,
        booked_seats: row.booked_seats.max(0) as u32,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

/// PostgreSQL-backed seat inventory
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl crate::infra::InventoryStore for PgInventoryStore {
    async fn try_reserve(&self, event_id: EventId, seats: u32) -> Result<SeatEvent> {
        let row: Option<SeatEventRow> = sqlx::query_as(
            r#"
            UPDATE seat_events
            SET booked_seats = booked_seats + $2, updated_at = NOW()
            WHERE event_id = $1 AND booked_seats + $2 <= total_seats
            RETURNING event_id, name, total_seats, booked_seats, created_at, updated_at
            "#,
        )
        .bind(event_id.0)
        .bind(seats as i32)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row_to_event(row)),
            // No row matched: either the event doesn't exist or the seats
            // didn't fit. Re-read only to classify; the reservation itself
            // never does read-then-write.
            None => match self.get_event(event_id).await? {
                Some(event) => Err(StoreError::CapacityExceeded {
                    event_id,
                    requested: seats,
                    available: event.seats_available(),
                }),
                None => Err(StoreError::EventNotFound(event_id)),
            },
        }
    }

    async fn release(&self, event_id: EventId, seats: u32) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE seat_events
            SET booked_seats = GREATEST(booked_seats - $2, 0), updated_at = NOW()
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.0)
        .bind(seats as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EventNotFound(event_id));
        }
        Ok(())
    }

    async fn insert_event(&self, event: &SeatEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO seat_events (event_id, name, total_seats, booked_seats, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.event_id.0)
        .bind(&event.name)
        .bind(event.total_seats as i32)
        .bind(event.booked_seats as i32)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<SeatEvent>> {
        let row: Option<SeatEventRow> = sqlx::query_as(
            r#"
            SELECT event_id, name, total_seats, booked_seats, created_at, updated_at
            FROM seat_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_event))
    }
}
