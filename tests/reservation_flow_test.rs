//! Reservation lifecycle: creation window rules, confirmation with
//! table allocation, check-in coupling to order creation, and the
//! overdue sweep.

mod common;

use bistro_api::{
    entities::dining_table::TableStatus,
    entities::reservation,
    errors::ServiceError,
    services::reservations::CreateReservationRequest,
};
use chrono::{DateTime, Duration, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
        .and_utc()
}

fn request(reserved_at: DateTime<Utc>, party_size: i32, table_id: Option<Uuid>) -> CreateReservationRequest {
    CreateReservationRequest {
        customer_name: "Linh Tran".to_string(),
        phone: "0912345678".to_string(),
        table_id,
        reserved_at,
        party_size,
        notes: None,
    }
}

#[tokio::test]
async fn creation_enforces_the_booking_window() {
    let app = TestApp::new().await;

    // Outside operating hours (22:00).
    let err = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(22, 0), 2, None))
        .await
        .unwrap_err();
    match err {
        ServiceError::ValidationError(msg) => {
            assert!(msg.contains("operating hours"), "got: {msg}")
        }
        other => panic!("expected validation error, got: {other}"),
    }

    // In the past.
    let err = app
        .services
        .reservations
        .create_reservation(request(Utc::now() - Duration::hours(3), 2, None))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // More than 7 days ahead.
    let err = app
        .services
        .reservations
        .create_reservation(request(
            (Utc::now() + Duration::days(9))
                .date_naive()
                .and_hms_opt(12, 0, 0)
                .unwrap()
                .and_utc(),
            2,
            None,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // A valid booking goes through as Pending.
    let reservation = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(12, 0), 2, None))
        .await
        .unwrap();
    assert_eq!(reservation.status, "Pending");
}

#[tokio::test]
async fn booking_a_table_places_a_hold_on_it() {
    let app = TestApp::new().await;
    let table = app.seed_table("W1", 4).await;

    app.services
        .reservations
        .create_reservation(request(tomorrow_at(18, 0), 2, Some(table.id)))
        .await
        .unwrap();

    let table = app.services.tables.get_table(table.id).await.unwrap();
    assert_eq!(table.status, TableStatus::Reserved);

    // A second booking for the same table conflicts.
    let err = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(19, 0), 2, Some(table.id)))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn confirmation_allocates_the_smallest_sufficient_table() {
    let app = TestApp::new().await;
    // Window tables are allocated last; capacity first-fit otherwise.
    let window = app.seed_table_opts("Window", 4, true).await;
    let small = app.seed_table("Small", 2).await;
    let medium = app.seed_table("Medium", 4).await;
    let large = app.seed_table("Large", 8).await;

    let reservation = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(18, 0), 4, None))
        .await
        .unwrap();
    let confirmed = app
        .services
        .reservations
        .confirm_reservation(reservation.id)
        .await
        .unwrap();

    assert_eq!(confirmed.status, "Confirmed");
    assert_eq!(confirmed.table_id, Some(medium.id));
    let medium = app.services.tables.get_table(medium.id).await.unwrap();
    assert_eq!(medium.status, TableStatus::Reserved);

    // The others stay untouched.
    for id in [window.id, small.id, large.id] {
        let t = app.services.tables.get_table(id).await.unwrap();
        assert_eq!(t.status, TableStatus::Available);
    }

    // Only pending reservations can be confirmed.
    let err = app
        .services
        .reservations
        .confirm_reservation(reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn cancelling_releases_the_hold() {
    let app = TestApp::new().await;
    let table = app.seed_table("W2", 4).await;

    let reservation = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(18, 0), 2, Some(table.id)))
        .await
        .unwrap();
    app.services
        .reservations
        .cancel_reservation(reservation.id)
        .await
        .unwrap();

    let table = app.services.tables.get_table(table.id).await.unwrap();
    assert_eq!(table.status, TableStatus::Available);

    let err = app
        .services
        .reservations
        .cancel_reservation(reservation.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn check_in_opens_a_dine_in_order_on_the_table() {
    let app = TestApp::new().await;
    let table = app.seed_table("W3", 4).await;
    let dish = app.seed_dish("Pho", dec!(12.00)).await;

    let reservation = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(18, 0), 2, Some(table.id)))
        .await
        .unwrap();

    let result = app
        .services
        .reservations
        .check_in(reservation.id, None)
        .await
        .unwrap();

    assert_eq!(result.reservation.status, "CheckedIn");
    assert_eq!(result.order.order_type, "DineIn");
    assert_eq!(result.order.table_id, Some(table.id));
    assert_eq!(result.order.customer_name.as_deref(), Some("Linh Tran"));
    assert_eq!(result.table.status, "Occupied");

    // The reservation left the sweep's candidate set, and the waiter can
    // add items to the opened order.
    let order = app
        .services
        .orders
        .add_item(
            result.order.id,
            bistro_api::services::orders::OrderLineRequest {
                dish_id: Some(dish.id),
                combo_id: None,
                quantity: 1,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(12.00));

    // A checked-in reservation cannot be checked in again.
    let err = app
        .services
        .reservations
        .check_in(reservation.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn sweep_cancels_only_overdue_pending_reservations() {
    let app = TestApp::new().await;
    let held = app.seed_table("W4", 4).await;

    let overdue = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(12, 0), 2, Some(held.id)))
        .await
        .unwrap();
    let fresh = app
        .services
        .reservations
        .create_reservation(request(tomorrow_at(13, 0), 2, None))
        .await
        .unwrap();

    // Backdate one reservation past the 30-minute grace period.
    let model = reservation::Entity::find_by_id(overdue.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: reservation::ActiveModel = model.into();
    active.reserved_at = Set(Utc::now() - Duration::minutes(31));
    active.update(&*app.db).await.unwrap();

    let cancelled = app
        .services
        .reservations
        .sweep_overdue(Utc::now())
        .await
        .unwrap();
    assert_eq!(cancelled, 1);

    let swept = app
        .services
        .reservations
        .get_reservation(overdue.id)
        .await
        .unwrap();
    assert_eq!(swept.status, "Cancelled");

    let untouched = app
        .services
        .reservations
        .get_reservation(fresh.id)
        .await
        .unwrap();
    assert_eq!(untouched.status, "Pending");

    // The sweep also frees the table the cancelled reservation held.
    let held = app.services.tables.get_table(held.id).await.unwrap();
    assert_eq!(held.status, TableStatus::Available);

    // Within the grace period nothing is swept.
    let cancelled = app
        .services
        .reservations
        .sweep_overdue(Utc::now())
        .await
        .unwrap();
    assert_eq!(cancelled, 0);
}
