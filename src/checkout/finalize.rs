//! The finalization state machine.
//!
//! Turns a paid provider session into exactly one booking plus one seat
//! reservation, no matter how many times or in what order the two completion
//! triggers (status poll, webhook) invoke it:
//!
//! 1. idempotency short-circuit on an already-resolved order
//! 2. quantity validation
//! 3. capacity-checked atomic reservation (the only non-compensating seat
//!    mutation in the system)
//! 4. ticket mint + booking write, regenerating on ticket collision
//! 5. commit: order -> Paid with booking/ticket identifiers
//! 6. compensation: release the reservation and fail the order when the
//!    booking cannot be written
//!
//! Two concurrent invocations for the same order can both pass step 1; the
//! booking ledger's session-uniqueness makes exactly one write win, and the
//! loser releases its own reservation and returns the winner's result.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{
    Booking, BookingId, NewBooking, Order, OrderId, OrderStatus, PaymentProof, PaymentStatus,
    SessionRef, TicketId,
};
use crate::infra::{BookingLedger, InventoryStore, OrderLedger, StoreError};

/// Mint attempts before a persistent ticket collision is treated as a
/// construction defect rather than bad luck.
pub const MAX_TICKET_MINTS: u32 = 5;

/// Outcome of a finalization attempt, as reported to the triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalization {
    /// The order is resolved; identifiers are stable across re-invocations
    Ready {
        ticket_id: TicketId,
        booking_id: BookingId,
    },
    /// The order is terminally unfulfillable
    Failed { reason: FailureReason },
}

/// Buyer-presentable failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    SoldOut,
    InvalidQuantity,
    PaymentFailed,
    SessionExpired,
    CheckoutCancelled,
}

impl FailureReason {
    /// Terse user-visible message; internals stay in the logs
    pub fn message(&self) -> &'static str {
        match self {
            FailureReason::SoldOut => "not enough seats",
            FailureReason::InvalidQuantity => "invalid seat quantity",
            FailureReason::PaymentFailed => "payment could not be completed",
            FailureReason::SessionExpired => "checkout session expired",
            FailureReason::CheckoutCancelled => "checkout was cancelled",
        }
    }

    fn for_terminal_status(status: OrderStatus) -> Option<Self> {
        match status {
            OrderStatus::Failed => Some(FailureReason::PaymentFailed),
            OrderStatus::Expired => Some(FailureReason::SessionExpired),
            OrderStatus::Cancelled => Some(FailureReason::CheckoutCancelled),
            OrderStatus::Pending | OrderStatus::Paid => None,
        }
    }
}

/// Fatal finalization failures, surfaced to the caller for logging and
/// manual reconciliation. Compensation has already run by the time one of
/// these is returned.
#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("ticket generation collided {attempts} times for order {order_id}")]
    TicketMintExhausted { order_id: OrderId, attempts: u32 },

    #[error("order {0} is marked paid but carries no booking reference")]
    MissingResolution(OrderId),

    #[error("a booking exists for session {session_ref} but not for order {order_id}")]
    SessionConflict {
        order_id: OrderId,
        session_ref: SessionRef,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

enum BookingWrite {
    Written(Booking),
    /// A booking for this session already exists: a concurrent finalize won
    LostSession,
    MintExhausted,
    /// The ledger failed for a reason the protocol cannot absorb
    Fatal(StoreError),
}

/// The finalization engine. Stateless; every invocation works from the
/// order snapshot it is given plus the durable stores' atomic primitives.
pub struct Finalizer {
    inventory: Arc<dyn InventoryStore>,
    orders: Arc<dyn OrderLedger>,
    bookings: Arc<dyn BookingLedger>,
}

impl Finalizer {
    pub fn new(
        inventory: Arc<dyn InventoryStore>,
        orders: Arc<dyn OrderLedger>,
        bookings: Arc<dyn BookingLedger>,
    ) -> Self {
        Self {
            inventory,
            orders,
            bookings,
        }
    }

    /// Finalize an order against provider proof of payment.
    ///
    /// Safe to call redundantly and concurrently for the same order: at most
    /// one invocation creates a booking, and every invocation that returns
    /// `Ready` reports the same identifiers.
    #[instrument(
        skip(self, order, proof),
        fields(
            order_id = %order.order_id,
            event_id = %order.event_id,
            quantity = order.quantity,
            session_ref = %proof.session_ref,
        )
    )]
    pub async fn finalize(
        &self,
        order: &Order,
        proof: &PaymentProof,
    ) -> Result<Finalization, FinalizeError> {
        // Step 1: idempotency short-circuit. The primary defense against
        // double-invocation by the two triggers.
        if let Some((ticket_id, booking_id)) = order.resolution() {
            debug!("order already resolved");
            return Ok(Finalization::Ready {
                ticket_id,
                booking_id,
            });
        }

        match order.status {
            OrderStatus::Pending => {}
            OrderStatus::Paid => {
                // Paid without identifiers should not exist; refuse to guess.
                return Err(FinalizeError::MissingResolution(order.order_id));
            }
            status => {
                let reason = FailureReason::for_terminal_status(status)
                    .unwrap_or(FailureReason::PaymentFailed);
                return Ok(Finalization::Failed { reason });
            }
        }

        // Step 2: validate quantity before any mutation.
        if order.quantity == 0 {
            warn!("order carries a zero quantity");
            return self.fail_or_adopt(order, FailureReason::InvalidQuantity).await;
        }

        // Step 3: capacity-checked atomic reservation.
        match self
            .inventory
            .try_reserve(order.event_id, order.quantity)
            .await
        {
            Ok(event) => {
                debug!(booked_seats = event.booked_seats, "seats reserved");
            }
            Err(StoreError::CapacityExceeded { available, .. }) => {
                info!(available, "capacity exhausted during finalization");
                return self.fail_or_adopt(order, FailureReason::SoldOut).await;
            }
            Err(e) => return Err(e.into()),
        }

        // Step 4: mint a ticket and write the booking. Step 6 (compensation)
        // lives on the failure arms: the reservation from step 3 must not
        // survive a booking that was never written.
        let booking = match self.write_booking(order, proof).await {
            BookingWrite::Written(booking) => booking,
            BookingWrite::LostSession => {
                // A concurrent finalize for this session won the insert.
                // Undo our reservation and adopt the winner's result.
                self.compensate_reservation(order).await;
                return self.adopt_winner(order, proof).await;
            }
            BookingWrite::MintExhausted => {
                self.compensate_reservation(order).await;
                self.fail_quietly(order).await;
                return Err(FinalizeError::TicketMintExhausted {
                    order_id: order.order_id,
                    attempts: MAX_TICKET_MINTS,
                });
            }
            BookingWrite::Fatal(e) => {
                error!(error = %e, "booking write failed, compensating reservation");
                self.compensate_reservation(order).await;
                self.fail_quietly(order).await;
                return Err(e.into());
            }
        };

        // Step 5: commit the order.
        let committed = self
            .orders
            .commit_paid(
                order.order_id,
                booking.booking_id,
                &booking.ticket_id,
                proof.payment_ref.clone(),
            )
            .await?;

        if !committed {
            // The order left Pending between our reservation and the commit
            // (an expiry signal raced in). The booking is durable and the
            // payment real; keep it and leave the rest to reconciliation.
            error!(
                booking_id = %booking.booking_id,
                "order no longer pending at commit; booking kept for reconciliation"
            );
        }

        info!(
            ticket_id = %booking.ticket_id,
            booking_id = %booking.booking_id,
            "order finalized"
        );
        Ok(Finalization::Ready {
            ticket_id: booking.ticket_id,
            booking_id: booking.booking_id,
        })
    }

    /// Mint-and-insert loop. Insertion is the uniqueness authority: ticket
    /// collisions regenerate up to `MAX_TICKET_MINTS` times, a session
    /// collision means a concurrent invocation already wrote the booking.
    async fn write_booking(&self, order: &Order, proof: &PaymentProof) -> BookingWrite {
        for attempt in 1..=MAX_TICKET_MINTS {
            let ticket_id = TicketId::generate();
            let new_booking = NewBooking {
                booking_id: BookingId::new(),
                order_id: order.order_id,
                user_id: order.user_id,
                event_id: order.event_id,
                seats: order.quantity,
                ticket_id,
                payment_status: PaymentStatus::Paid,
                session_ref: proof.session_ref.clone(),
                payment_ref: proof.payment_ref.clone(),
            };

            match self.bookings.create(&new_booking).await {
                Ok(booking) => return BookingWrite::Written(booking),
                Err(StoreError::DuplicateTicket(ticket_id)) => {
                    warn!(attempt, %ticket_id, "ticket token collision, regenerating");
                    continue;
                }
                Err(StoreError::DuplicateSession(_)) => return BookingWrite::LostSession,
                Err(e) => return BookingWrite::Fatal(e),
            }
        }
        BookingWrite::MintExhausted
    }

    /// Transition the order to Failed; if the transition loses (the order
    /// was concurrently resolved), adopt the winner's result instead of
    /// clobbering a terminal state.
    async fn fail_or_adopt(
        &self,
        order: &Order,
        reason: FailureReason,
    ) -> Result<Finalization, FinalizeError> {
        let transitioned = self
            .orders
            .transition(order.order_id, OrderStatus::Failed)
            .await?;
        if transitioned {
            return Ok(Finalization::Failed { reason });
        }

        let fresh = self
            .orders
            .get(order.order_id)
            .await?
            .ok_or(StoreError::OrderNotFound(order.order_id))?;
        if let Some((ticket_id, booking_id)) = fresh.resolution() {
            info!("order was finalized concurrently");
            return Ok(Finalization::Ready {
                ticket_id,
                booking_id,
            });
        }
        Ok(Finalization::Failed {
            reason: FailureReason::for_terminal_status(fresh.status).unwrap_or(reason),
        })
    }

    /// Adopt the result of the concurrent invocation that won the booking
    /// insert. The booking is the authority: it may exist a moment before
    /// the winner commits the order row.
    async fn adopt_winner(
        &self,
        order: &Order,
        proof: &PaymentProof,
    ) -> Result<Finalization, FinalizeError> {
        let winner = self
            .bookings
            .get_by_session_ref(&proof.session_ref)
            .await?;

        match winner {
            Some(booking) if booking.order_id == order.order_id => {
                info!(
                    booking_id = %booking.booking_id,
                    "adopting concurrently created booking"
                );
                Ok(Finalization::Ready {
                    ticket_id: booking.ticket_id,
                    booking_id: booking.booking_id,
                })
            }
            // A booking for this session that belongs to a different order
            // (or vanished) is a reconciliation case, not a buyer failure.
            _ => Err(FinalizeError::SessionConflict {
                order_id: order.order_id,
                session_ref: proof.session_ref.clone(),
            }),
        }
    }

    /// Release a reservation on a failure path. Release never re-fails on
    /// capacity; any error here is logged with enough context for manual
    /// reconciliation and must not mask the original failure.
    async fn compensate_reservation(&self, order: &Order) {
        if let Err(e) = self
            .inventory
            .release(order.event_id, order.quantity)
            .await
        {
            error!(
                error = %e,
                event_id = %order.event_id,
                quantity = order.quantity,
                "failed to release reservation; seat counts need reconciliation"
            );
        }
    }

    /// Best-effort Failed transition on a path that is already surfacing an
    /// error; a lost transition here just means something else resolved the
    /// order first.
    async fn fail_quietly(&self, order: &Order) {
        match self
            .orders
            .transition(order.order_id, OrderStatus::Failed)
            .await
        {
            Ok(_) => {}
            Err(e) => error!(error = %e, "failed to mark order as failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EventId, SeatEvent, SessionRef, UserId};
    use crate::infra::{
        MockBookingLedger, MockInventoryStore, MockOrderLedger,
    };
    use chrono::Utc;
    use mockall::predicate::eq;
    use uuid::Uuid;

    fn pending_order(quantity: u32) -> Order {
        Order {
            order_id: OrderId::new(),
            event_id: EventId::new(),
            user_id: UserId::from_uuid(Uuid::new_v4()),
            ticket_name: "General Admission".to_string(),
            quantity,
            unit_amount: 2500,
            currency: "usd".to_string(),
            buyer_name: None,
            buyer_email: None,
            session_ref: Some(SessionRef::new("cs_1")),
            payment_ref: None,
            status: OrderStatus::Pending,
            booking_id: None,
            ticket_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn proof() -> PaymentProof {
        PaymentProof {
            session_ref: SessionRef::new("cs_1"),
            payment_ref: Some(crate::domain::PaymentRef::new("pi_1")),
        }
    }

    fn reserved_event(order: &Order) -> SeatEvent {
        SeatEvent {
            event_id: order.event_id,
            name: "Test Gig".to_string(),
            total_seats: 100,
            booked_seats: order.quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn finalizer(
        inventory: MockInventoryStore,
        orders: MockOrderLedger,
        bookings: MockBookingLedger,
    ) -> Finalizer {
        Finalizer::new(Arc::new(inventory), Arc::new(orders), Arc::new(bookings))
    }

    #[tokio::test]
    async fn resolved_order_short_circuits_without_store_calls() {
        let mut order = pending_order(1);
        order.status = OrderStatus::Paid;
        order.ticket_id = Some(TicketId::new("TKT-EXISTING"));
        order.booking_id = Some(BookingId::new());

        // No expectations set: any store call would panic the mock.
        let f = finalizer(
            MockInventoryStore::new(),
            MockOrderLedger::new(),
            MockBookingLedger::new(),
        );

        let got = f.finalize(&order, &proof()).await.unwrap();
        assert_eq!(
            got,
            Finalization::Ready {
                ticket_id: order.ticket_id.clone().unwrap(),
                booking_id: order.booking_id.unwrap(),
            }
        );
    }

    #[tokio::test]
    async fn zero_quantity_fails_before_touching_inventory() {
        let order = pending_order(0);

        let mut orders = MockOrderLedger::new();
        orders
            .expect_transition()
            .with(eq(order.order_id), eq(OrderStatus::Failed))
            .times(1)
            .returning(|_, _| Ok(true));

        let f = finalizer(MockInventoryStore::new(), orders, MockBookingLedger::new());

        let got = f.finalize(&order, &proof()).await.unwrap();
        assert_eq!(
            got,
            Finalization::Failed {
                reason: FailureReason::InvalidQuantity
            }
        );
    }

    #[tokio::test]
    async fn ticket_collision_regenerates_then_succeeds() {
        let order = pending_order(2);
        let event = reserved_event(&order);

        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_try_reserve()
            .with(eq(order.event_id), eq(2u32))
            .times(1)
            .returning(move |_, _| Ok(event.clone()));

        let mut bookings = MockBookingLedger::new();
        let mut attempts = 0u32;
        bookings.expect_create().times(3).returning(move |nb| {
            attempts += 1;
            if attempts < 3 {
                Err(StoreError::DuplicateTicket(nb.ticket_id.clone()))
            } else {
                Ok(Booking {
                    booking_id: nb.booking_id,
                    order_id: nb.order_id,
                    user_id: nb.user_id,
                    event_id: nb.event_id,
                    seats: nb.seats,
                    ticket_id: nb.ticket_id.clone(),
                    payment_status: nb.payment_status,
                    session_ref: nb.session_ref.clone(),
                    payment_ref: nb.payment_ref.clone(),
                    created_at: Utc::now(),
                })
            }
        });

        let mut orders = MockOrderLedger::new();
        orders
            .expect_commit_paid()
            .times(1)
            .returning(|_, _, _, _| Ok(true));

        let f = finalizer(inventory, orders, bookings);
        let got = f.finalize(&order, &proof()).await.unwrap();
        assert!(matches!(got, Finalization::Ready { .. }));
    }

    #[tokio::test]
    async fn fatal_booking_failure_releases_and_fails_order() {
        let order = pending_order(3);
        let event = reserved_event(&order);

        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_try_reserve()
            .times(1)
            .returning(move |_, _| Ok(event.clone()));
        inventory
            .expect_release()
            .with(eq(order.event_id), eq(3u32))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut bookings = MockBookingLedger::new();
        bookings.expect_create().times(1).returning(|_| {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        });

        let mut orders = MockOrderLedger::new();
        orders
            .expect_transition()
            .with(eq(order.order_id), eq(OrderStatus::Failed))
            .times(1)
            .returning(|_, _| Ok(true));

        let f = finalizer(inventory, orders, bookings);
        let err = f.finalize(&order, &proof()).await.unwrap_err();
        assert!(matches!(err, FinalizeError::Store(StoreError::Database(_))));
    }

    #[tokio::test]
    async fn mint_exhaustion_compensates_and_surfaces_defect() {
        let order = pending_order(1);
        let event = reserved_event(&order);

        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_try_reserve()
            .times(1)
            .returning(move |_, _| Ok(event.clone()));
        inventory
            .expect_release()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut bookings = MockBookingLedger::new();
        bookings
            .expect_create()
            .times(MAX_TICKET_MINTS as usize)
            .returning(|nb| Err(StoreError::DuplicateTicket(nb.ticket_id.clone())));

        let mut orders = MockOrderLedger::new();
        orders
            .expect_transition()
            .times(1)
            .returning(|_, _| Ok(true));

        let f = finalizer(inventory, orders, bookings);
        let err = f.finalize(&order, &proof()).await.unwrap_err();
        assert!(matches!(
            err,
            FinalizeError::TicketMintExhausted { attempts, .. } if attempts == MAX_TICKET_MINTS
        ));
    }

    #[tokio::test]
    async fn lost_session_race_releases_and_adopts_winner() {
        let order = pending_order(1);
        let event = reserved_event(&order);
        let winner_ticket = TicketId::new("TKT-WINNER");
        let winner_booking = BookingId::new();

        let mut inventory = MockInventoryStore::new();
        inventory
            .expect_try_reserve()
            .times(1)
            .returning(move |_, _| Ok(event.clone()));
        inventory
            .expect_release()
            .with(eq(order.event_id), eq(1u32))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut bookings = MockBookingLedger::new();
        bookings
            .expect_create()
            .times(1)
            .returning(|nb| Err(StoreError::DuplicateSession(nb.session_ref.clone())));
        let order_id = order.order_id;
        let user_id = order.user_id;
        let event_id = order.event_id;
        let wt = winner_ticket.clone();
        bookings
            .expect_get_by_session_ref()
            .times(1)
            .returning(move |sr| {
                Ok(Some(Booking {
                    booking_id: winner_booking,
                    order_id,
                    user_id,
                    event_id,
                    seats: 1,
                    ticket_id: wt.clone(),
                    payment_status: PaymentStatus::Paid,
                    session_ref: sr.clone(),
                    payment_ref: None,
                    created_at: Utc::now(),
                }))
            });

        let f = finalizer(inventory, MockOrderLedger::new(), bookings);
        let got = f.finalize(&order, &proof()).await.unwrap();
        assert_eq!(
            got,
            Finalization::Ready {
                ticket_id: winner_ticket,
                booking_id: winner_booking,
            }
        );
    }

    #[tokio::test]
    async fn capacity_loss_adopts_winner_when_order_already_resolved() {
        let order = pending_order(1);
        let winner_ticket = TicketId::new("TKT-WINNER");
        let winner_booking = BookingId::new();

        let mut inventory = MockInventoryStore::new();
        inventory.expect_try_reserve().times(1).returning(|event_id, requested| {
            Err(StoreError::CapacityExceeded {
                event_id,
                requested,
                available: 0,
            })
        });

        let mut orders = MockOrderLedger::new();
        // Transition loses: the other trigger already committed Paid.
        orders
            .expect_transition()
            .times(1)
            .returning(|_, _| Ok(false));
        let resolved = {
            let mut o = order.clone();
            o.status = OrderStatus::Paid;
            o.ticket_id = Some(winner_ticket.clone());
            o.booking_id = Some(winner_booking);
            o
        };
        orders
            .expect_get()
            .times(1)
            .returning(move |_| Ok(Some(resolved.clone())));

        let f = finalizer(inventory, orders, MockBookingLedger::new());
        let got = f.finalize(&order, &proof()).await.unwrap();
        assert_eq!(
            got,
            Finalization::Ready {
                ticket_id: winner_ticket,
                booking_id: winner_booking,
            }
        );
    }

    #[tokio::test]
    async fn expired_order_reports_session_expired() {
        let mut order = pending_order(1);
        order.status = OrderStatus::Expired;

        let f = finalizer(
            MockInventoryStore::new(),
            MockOrderLedger::new(),
            MockBookingLedger::new(),
        );
        let got = f.finalize(&order, &proof()).await.unwrap();
        assert_eq!(
            got,
            Finalization::Failed {
                reason: FailureReason::SessionExpired
            }
        );
    }
}
