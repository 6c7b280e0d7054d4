//! Seating event: the inventory-bearing entity.
//!
//! `booked_seats` is a derived aggregate: at quiescence it equals the sum of
//! `seats` over all bookings referencing the event. It is mutated only
//! through the inventory store's capacity-checked conditional update (or its
//! compensating release), never by application-level read-then-write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::EventId;

/// A ticketed event with a finite number of seats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatEvent {
    pub event_id: EventId,
    pub name: String,
    /// Capacity, fixed at creation
    pub total_seats: u32,
    /// Seats consumed by finalized or in-flight reservations
    pub booked_seats: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SeatEvent {
    /// Seats still available for reservation
    pub fn seats_available(&self) -> u32 {
        self.total_seats.saturating_sub(self.booked_seats)
    }

    /// Whether a reservation of `seats` would fit right now. Advisory only:
    /// the store's conditional update is the authority under concurrency.
    pub fn can_fit(&self, seats: u32) -> bool {
        seats <= self.seats_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(total: u32, booked: u32) -> SeatEvent {
        SeatEvent {
            event_id: EventId::new(),
            name: "Test Gig".to_string(),
            total_seats: total,
            booked_seats: booked,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn seats_available_never_underflows() {
        assert_eq!(event(100, 0).seats_available(), 100);
        assert_eq!(event(100, 100).seats_available(), 0);
        // release floors at zero, but a stale snapshot should still be safe
        assert_eq!(event(100, 101).seats_available(), 0);
    }

    #[test]
    fn can_fit_respects_capacity() {
        let e = event(10, 7);
        assert!(e.can_fit(3));
        assert!(!e.can_fit(4));
        assert!(e.can_fit(0));
    }
}
