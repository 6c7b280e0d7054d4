//! Inventory invariant tests
//!
//! The core correctness property: `booked_seats` never exceeds
//! `total_seats`, even under heavy concurrent reservation pressure.

mod common;

use boxoffice::domain::EventId;
use boxoffice::infra::{InventoryStore, StoreError};

use common::TestWorld;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn two_hundred_concurrent_reservations_against_one_hundred_seats() {
    let world = TestWorld::new();
    let event = world.seed_event(100).await;

    let mut handles = Vec::with_capacity(200);
    for _ in 0..200 {
        let inventory = world.inventory.clone();
        let event_id = event.event_id;
        handles.push(tokio::spawn(async move {
            inventory.try_reserve(event_id, 1).await
        }));
    }

    let mut successes = 0;
    let mut capacity_exceeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(StoreError::CapacityExceeded { .. }) => capacity_exceeded += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(successes, 100);
    assert_eq!(capacity_exceeded, 100);
    assert_eq!(world.booked_seats(event.event_id).await, 100);
}

#[tokio::test]
async fn failed_reservation_does_not_mutate() {
    let world = TestWorld::new();
    let event = world.seed_event(10).await;

    world.inventory.try_reserve(event.event_id, 8).await.unwrap();
    let err = world.inventory.try_reserve(event.event_id, 3).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::CapacityExceeded {
            requested: 3,
            available: 2,
            ..
        }
    ));
    assert_eq!(world.booked_seats(event.event_id).await, 8);

    // The remaining seats are still reservable.
    world.inventory.try_reserve(event.event_id, 2).await.unwrap();
    assert_eq!(world.booked_seats(event.event_id).await, 10);
}

#[tokio::test]
async fn release_is_floored_at_zero() {
    let world = TestWorld::new();
    let event = world.seed_event(10).await;

    world.inventory.try_reserve(event.event_id, 2).await.unwrap();
    world.inventory.release(event.event_id, 5).await.unwrap();
    assert_eq!(world.booked_seats(event.event_id).await, 0);
}

#[tokio::test]
async fn unknown_event_is_reported_as_not_found() {
    let world = TestWorld::new();
    let missing = EventId::new();

    let err = world.inventory.try_reserve(missing, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::EventNotFound(id) if id == missing));

    let err = world.inventory.release(missing, 1).await.unwrap_err();
    assert!(matches!(err, StoreError::EventNotFound(id) if id == missing));
}
