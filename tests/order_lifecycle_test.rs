//! End-to-end order lifecycle: creation with table occupancy, line-item
//! management with total recomputation, kitchen item statuses and the
//! order status graph.

mod common;

use bistro_api::{
    entities::order::OrderType,
    entities::order_item::OrderItemStatus,
    entities::order::OrderStatus,
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderLineRequest, UpdateLineRequest},
};
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

fn dish_line(dish_id: Uuid, quantity: i32) -> OrderLineRequest {
    OrderLineRequest {
        dish_id: Some(dish_id),
        combo_id: None,
        quantity,
        notes: None,
    }
}

fn dine_in(table_id: Uuid, items: Vec<OrderLineRequest>) -> CreateOrderRequest {
    CreateOrderRequest {
        order_type: OrderType::DineIn,
        customer_name: Some("An Nguyen".to_string()),
        phone: Some("0901234567".to_string()),
        table_id: Some(table_id),
        items,
        notes: None,
    }
}

#[tokio::test]
async fn dine_in_order_occupies_table_and_computes_totals() {
    let app = TestApp::new().await;
    let table = app.seed_table("T1", 4).await;
    let bass = app.seed_dish("Grilled Sea Bass", dec!(50.00)).await;
    let chicken = app.seed_dish("Lemongrass Chicken", dec!(30.00)).await;

    let order = app
        .services
        .orders
        .create_order(dine_in(
            table.id,
            vec![dish_line(bass.id, 1), dish_line(chicken.id, 1)],
        ))
        .await
        .expect("order created");

    assert_eq!(order.subtotal, dec!(80.00));
    assert_eq!(order.discount_amount, dec!(0));
    assert_eq!(order.final_total, dec!(80.00));
    assert_eq!(order.status, "Pending");
    assert_eq!(order.items.len(), 2);

    let table = app.services.tables.get_table(table.id).await.unwrap();
    assert_eq!(
        table.status,
        bistro_api::entities::dining_table::TableStatus::Occupied
    );
}

#[tokio::test]
async fn two_parties_cannot_take_the_same_table() {
    let app = TestApp::new().await;
    let table = app.seed_table("T2", 4).await;
    let dish = app.seed_dish("Pho", dec!(12.00)).await;

    app.services
        .orders
        .create_order(dine_in(table.id, vec![dish_line(dish.id, 1)]))
        .await
        .expect("first party seats");

    let err = app
        .services
        .orders
        .create_order(dine_in(table.id, vec![dish_line(dish.id, 1)]))
        .await
        .unwrap_err();
    assert!(
        matches!(err, ServiceError::Conflict(_)),
        "second party must get a conflict, got: {err}"
    );
}

#[tokio::test]
async fn line_mutations_keep_the_totals_invariant() {
    let app = TestApp::new().await;
    let table = app.seed_table("T3", 4).await;
    let bass = app.seed_dish("Grilled Sea Bass", dec!(50.00)).await;
    let rolls = app.seed_dish("Spring Rolls", dec!(6.00)).await;

    let order = app
        .services
        .orders
        .create_order(dine_in(table.id, vec![dish_line(bass.id, 1)]))
        .await
        .unwrap();

    let order = app
        .services
        .orders
        .add_item(order.id, dish_line(rolls.id, 2))
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(62.00));
    assert_eq!(order.final_total, dec!(62.00));

    let rolls_line = order
        .items
        .iter()
        .find(|item| item.dish_id == Some(rolls.id))
        .unwrap();
    let order = app
        .services
        .orders
        .update_item(
            order.id,
            rolls_line.id,
            UpdateLineRequest {
                quantity: 3,
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(68.00));

    let rolls_line_id = rolls_line.id;
    let order = app
        .services
        .orders
        .remove_item(order.id, rolls_line_id)
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(50.00));
    assert_eq!(order.final_total, dec!(50.00));

    // Read-back equals the sum over non-cancelled lines.
    let fetched = app.services.orders.get_order(order.id).await.unwrap();
    let expected: rust_decimal::Decimal = fetched
        .items
        .iter()
        .filter(|item| item.status != "Cancelled")
        .map(|item| item.line_total)
        .sum();
    assert_eq!(fetched.subtotal, expected);
}

#[tokio::test]
async fn kitchen_advances_items_and_cancelling_a_line_reprices() {
    let app = TestApp::new().await;
    let table = app.seed_table("T4", 4).await;
    let bass = app.seed_dish("Grilled Sea Bass", dec!(50.00)).await;
    let rolls = app.seed_dish("Spring Rolls", dec!(6.00)).await;

    let order = app
        .services
        .orders
        .create_order(dine_in(
            table.id,
            vec![dish_line(bass.id, 1), dish_line(rolls.id, 1)],
        ))
        .await
        .unwrap();

    let bass_line = order
        .items
        .iter()
        .find(|item| item.dish_id == Some(bass.id))
        .unwrap()
        .id;
    let rolls_line = order
        .items
        .iter()
        .find(|item| item.dish_id == Some(rolls.id))
        .unwrap()
        .id;

    let order = app
        .services
        .orders
        .update_item_status(order.id, bass_line, OrderItemStatus::Preparing)
        .await
        .unwrap();
    let order = app
        .services
        .orders
        .update_item_status(order.id, bass_line, OrderItemStatus::Ready)
        .await
        .unwrap();

    // A ready line cannot be cancelled.
    let err = app
        .services
        .orders
        .update_item_status(order.id, bass_line, OrderItemStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // Cancelling the pending line removes it from the subtotal.
    let order = app
        .services
        .orders
        .update_item_status(order.id, rolls_line, OrderItemStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(50.00));
    assert_eq!(order.final_total, dec!(50.00));
}

#[tokio::test]
async fn terminal_orders_reject_further_changes() {
    let app = TestApp::new().await;
    let table = app.seed_table("T5", 4).await;
    let dish = app.seed_dish("Pho", dec!(12.00)).await;

    let order = app
        .services
        .orders
        .create_order(dine_in(table.id, vec![dish_line(dish.id, 1)]))
        .await
        .unwrap();

    // The graph forbids skipping straight to Completed.
    let err = app
        .services
        .orders
        .update_status(order.id, OrderStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    app.services
        .orders
        .update_status(order.id, OrderStatus::InProgress)
        .await
        .unwrap();
    app.services
        .orders
        .update_status(order.id, OrderStatus::Completed)
        .await
        .unwrap();

    let err = app
        .services
        .orders
        .add_item(order.id, dish_line(dish.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app
        .services
        .orders
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn cancelling_a_dine_in_order_releases_its_table() {
    let app = TestApp::new().await;
    let table = app.seed_table("T6", 4).await;
    let dish = app.seed_dish("Pho", dec!(12.00)).await;

    let order = app
        .services
        .orders
        .create_order(dine_in(table.id, vec![dish_line(dish.id, 1)]))
        .await
        .unwrap();

    app.services
        .orders
        .update_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let table = app.services.tables.get_table(table.id).await.unwrap();
    assert_eq!(
        table.status,
        bistro_api::entities::dining_table::TableStatus::Available
    );
}

#[tokio::test]
async fn customer_details_are_required_where_the_flow_demands_them() {
    let app = TestApp::new().await;
    let dish = app.seed_dish("Pho", dec!(12.00)).await;

    // Takeaway without a phone number.
    let err = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Takeaway,
            customer_name: Some("An".to_string()),
            phone: None,
            table_id: None,
            items: vec![dish_line(dish.id, 1)],
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // QR orders carry no customer requirement and re-price server-side.
    let order = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Qr,
            customer_name: None,
            phone: None,
            table_id: None,
            items: vec![dish_line(dish.id, 2)],
            notes: None,
        })
        .await
        .unwrap();
    assert_eq!(order.subtotal, dec!(24.00));

    // A table binding outside dine-in is rejected.
    let table = app.seed_table("T7", 4).await;
    let err = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Takeaway,
            customer_name: Some("An".to_string()),
            phone: Some("0901234567".to_string()),
            table_id: Some(table.id),
            items: vec![],
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Unresolvable references fail with NotFound.
    let err = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Qr,
            customer_name: None,
            phone: None,
            table_id: None,
            items: vec![dish_line(Uuid::new_v4(), 1)],
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
