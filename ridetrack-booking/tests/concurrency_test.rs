use chrono::{Duration, Utc};
use futures_util::future::join_all;
use ridetrack_booking::{ReservationManager, ReservationSettings};
use ridetrack_core::{
    BookingError, BookingStatus, GeoPoint, ManualClock, NewBooking, RetryPolicy, VehicleType,
};
use ridetrack_fleet::{CapacityLedger, FareEngine};
use ridetrack_store::MemoryStore;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    manager: Arc<ReservationManager>,
    ledger: Arc<CapacityLedger>,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn harness(lazy_expiry: bool) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let retry = RetryPolicy::immediate(200);
    let ledger = Arc::new(CapacityLedger::new(store.clone(), clock.clone(), retry.clone()));
    let manager = Arc::new(ReservationManager::new(
        ledger.clone(),
        store.clone(),
        FareEngine::default(),
        clock.clone(),
        ReservationSettings {
            reservation_timeout: Duration::minutes(10),
            lazy_expiry,
            retry,
        },
    ));
    Harness { manager, ledger, store, clock }
}

fn request(vehicle_id: Uuid, passenger: &str, passengers: u32) -> NewBooking {
    NewBooking {
        vehicle_id,
        passenger_id: passenger.to_string(),
        number_of_passengers: passengers,
        pickup: GeoPoint::new(14.5547, 121.0244),
        dropoff: GeoPoint::new(14.5995, 120.9842),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_passengers_race_for_last_seat() {
    let h = harness(true);
    let vehicle = Uuid::new_v4();
    h.ledger.register(vehicle, VehicleType::Bus, 40).await.unwrap();
    h.ledger.set_online(vehicle, 38).await.unwrap();
    h.ledger.set_offline(vehicle, 1).await.unwrap();

    let a = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.create_booking(request(vehicle, "alice", 1)).await }
    });
    let b = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.create_booking(request(vehicle, "bob", 1)).await }
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let won = results.iter().filter(|r| r.is_ok()).count();
    let lost = results
        .iter()
        .filter(|r| matches!(r, Err(BookingError::InsufficientCapacity { requested: 1, available: 0 })))
        .count();
    assert_eq!((won, lost), (1, 1));

    let seats = h.ledger.snapshot(vehicle).await.unwrap();
    assert_eq!(seats.online_booked_seats, 39);
    assert_eq!(seats.available_seats, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_concurrent_bookings_never_overbook() {
    let h = harness(false);
    let vehicle = Uuid::new_v4();
    h.ledger.register(vehicle, VehicleType::Minibus, 18).await.unwrap();

    let attempts = (0..60).map(|i| {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.create_booking(request(vehicle, &format!("p-{}", i), 1 + i % 2)).await })
    });
    let results: Vec<_> = join_all(attempts).await.into_iter().map(|r| r.unwrap()).collect();

    let mut booked_seats = 0;
    for result in &results {
        match result {
            Ok(booking) => booked_seats += booking.number_of_passengers,
            Err(BookingError::InsufficientCapacity { .. }) => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    let seats = h.ledger.snapshot(vehicle).await.unwrap();
    assert!(booked_seats <= 18);
    assert_eq!(seats.online_booked_seats, booked_seats);
    assert_eq!(seats.occupied() + seats.available_seats, 18);

    let pending = h.manager.list_bookings(vehicle, BookingStatus::Pending).await.unwrap();
    let held: u32 = pending.iter().map(|b| b.number_of_passengers).sum();
    assert_eq!(held, booked_seats);
}

#[tokio::test]
async fn test_expiry_respects_reservation_window() {
    let h = harness(false);
    let vehicle = Uuid::new_v4();
    h.ledger.register(vehicle, VehicleType::Bus, 40).await.unwrap();
    let booking = h.manager.create_booking(request(vehicle, "carol", 3)).await.unwrap();

    h.clock.advance(Duration::minutes(9));
    assert_eq!(h.manager.expire_stale_bookings(vehicle).await.unwrap(), 0);
    assert_eq!(h.ledger.snapshot(vehicle).await.unwrap().online_booked_seats, 3);

    h.clock.advance(Duration::minutes(2));
    assert_eq!(h.manager.expire_stale_bookings(vehicle).await.unwrap(), 1);

    let expired = h.manager.get_booking(booking.id).await.unwrap();
    assert_eq!(expired.status, BookingStatus::Expired);
    assert!(expired.is_expired);
    assert_eq!(h.ledger.snapshot(vehicle).await.unwrap().online_booked_seats, 0);

    // Nothing left: no count, no writes.
    let writes = h.store.write_count();
    assert_eq!(h.manager.expire_stale_bookings(vehicle).await.unwrap(), 0);
    assert_eq!(h.store.write_count(), writes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sweeps_release_seats_once() {
    let h = harness(false);
    let vehicle = Uuid::new_v4();
    h.ledger.register(vehicle, VehicleType::Bus, 40).await.unwrap();
    for i in 0..5 {
        h.manager.create_booking(request(vehicle, &format!("p-{}", i), 2)).await.unwrap();
    }
    h.ledger.add_offline_passenger(vehicle).await.unwrap();

    h.clock.advance(Duration::minutes(11));
    let sweeps = (0..4).map(|_| {
        let manager = h.manager.clone();
        tokio::spawn(async move { manager.expire_stale_bookings(vehicle).await })
    });
    let expired: usize = join_all(sweeps).await.into_iter().map(|r| r.unwrap().unwrap()).sum();

    assert_eq!(expired, 5);
    let seats = h.ledger.snapshot(vehicle).await.unwrap();
    assert_eq!(seats.online_booked_seats, 0);
    assert_eq!(seats.offline_occupied_seats, 1);
    assert_eq!(seats.available_seats, 39);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_sweep_releases_once() {
    let h = harness(false);
    let vehicle = Uuid::new_v4();
    h.ledger.register(vehicle, VehicleType::Van, 12).await.unwrap();
    let booking = h.manager.create_booking(request(vehicle, "dave", 4)).await.unwrap();
    h.clock.advance(Duration::minutes(11));

    let cancel = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.cancel_booking(booking.id, "dave").await }
    });
    let sweep = tokio::spawn({
        let manager = h.manager.clone();
        async move { manager.expire_stale_bookings(vehicle).await }
    });

    let cancelled = cancel.await.unwrap();
    let expired = sweep.await.unwrap().unwrap();
    match cancelled {
        Ok(_) => assert_eq!(expired, 0),
        Err(BookingError::BookingExpired(_)) => assert_eq!(expired, 1),
        Err(other) => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.ledger.snapshot(vehicle).await.unwrap().online_booked_seats, 0);
}

#[tokio::test]
async fn test_lazy_expiry_frees_abandoned_seats() {
    let h = harness(true);
    let vehicle = Uuid::new_v4();
    h.ledger.register(vehicle, VehicleType::Van, 2).await.unwrap();
    h.manager.create_booking(request(vehicle, "erin", 2)).await.unwrap();

    let err = h.manager.create_booking(request(vehicle, "frank", 1)).await.unwrap_err();
    assert!(matches!(err, BookingError::InsufficientCapacity { .. }));

    h.clock.advance(Duration::minutes(11));
    let booking = h.manager.create_booking(request(vehicle, "frank", 1)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(h.ledger.snapshot(vehicle).await.unwrap().online_booked_seats, 1);
}

#[tokio::test]
async fn test_fleet_sweep_covers_every_vehicle() {
    let h = harness(false);
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let untouched = Uuid::new_v4();
    for id in [first, second, untouched] {
        h.ledger.register(id, VehicleType::Bus, 10).await.unwrap();
    }
    h.manager.create_booking(request(first, "a", 1)).await.unwrap();
    h.manager.create_booking(request(second, "b", 2)).await.unwrap();
    h.manager.create_booking(request(second, "c", 1)).await.unwrap();

    h.clock.advance(Duration::minutes(11));
    h.manager.create_booking(request(untouched, "d", 1)).await.unwrap();

    let summary = h.manager.expire_all_stale().await.unwrap();
    assert_eq!(summary.expired, 3);
    assert_eq!(summary.failed_vehicles, 0);
    assert!(summary.vehicles.contains(&first) && summary.vehicles.contains(&second));
    assert!(!summary.vehicles.contains(&untouched));
    assert_eq!(h.ledger.snapshot(untouched).await.unwrap().online_booked_seats, 1);
}
