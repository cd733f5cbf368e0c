//! Table grouping (merge/split seating) and the staff status override.

mod common;

use bistro_api::{
    entities::dining_table::TableStatus,
    errors::ServiceError,
    services::tables::GroupTablesRequest,
};
use common::TestApp;
use uuid::Uuid;

#[tokio::test]
async fn merging_needs_at_least_two_known_tables() {
    let app = TestApp::new().await;
    let t1 = app.seed_table("G1", 4).await;

    let err = app
        .services
        .tables
        .create_group(GroupTablesRequest {
            table_ids: vec![t1.id],
            created_by: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Duplicated ids collapse to fewer than two.
    let err = app
        .services
        .tables
        .create_group(GroupTablesRequest {
            table_ids: vec![t1.id, t1.id],
            created_by: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let err = app
        .services
        .tables
        .create_group(GroupTablesRequest {
            table_ids: vec![t1.id, Uuid::new_v4()],
            created_by: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn group_lifecycle_create_query_disband() {
    let app = TestApp::new().await;
    let t1 = app.seed_table("G2", 4).await;
    let t2 = app.seed_table("G3", 4).await;
    let t3 = app.seed_table("G4", 2).await;

    let group = app
        .services
        .tables
        .create_group(GroupTablesRequest {
            table_ids: vec![t1.id, t2.id],
            created_by: None,
            notes: Some("party of 8".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(group.table_ids.len(), 2);

    // A table belongs to at most one active group.
    let err = app
        .services
        .tables
        .create_group(GroupTablesRequest {
            table_ids: vec![t2.id, t3.id],
            created_by: None,
            notes: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let members = app
        .services
        .tables
        .get_tables_in_group(group.id)
        .await
        .unwrap();
    let mut names: Vec<&str> = members.iter().map(|t| t.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["G2", "G3"]);

    app.services.tables.disband_group(group.id).await.unwrap();
    let err = app
        .services
        .tables
        .get_tables_in_group(group.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // After disbanding, the freed table can join a new group.
    app.services
        .tables
        .create_group(GroupTablesRequest {
            table_ids: vec![t2.id, t3.id],
            created_by: None,
            notes: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn status_override_guards_against_double_seating() {
    let app = TestApp::new().await;
    let table = app.seed_table("G5", 4).await;

    let updated = app
        .services
        .tables
        .update_status(table.id, TableStatus::Occupied)
        .await
        .unwrap();
    assert_eq!(updated.status, TableStatus::Occupied);

    // Same-status override is a no-op success.
    let updated = app
        .services
        .tables
        .update_status(table.id, TableStatus::Occupied)
        .await
        .unwrap();
    assert_eq!(updated.status, TableStatus::Occupied);

    // Release and re-occupy through the override path.
    app.services
        .tables
        .update_status(table.id, TableStatus::Available)
        .await
        .unwrap();

    // A table with an active order cannot be seated over.
    let dish = app.seed_dish("Pho", rust_decimal_macros::dec!(12.00)).await;
    app.services
        .orders
        .create_order(bistro_api::services::orders::CreateOrderRequest {
            order_type: bistro_api::entities::order::OrderType::DineIn,
            customer_name: Some("An".to_string()),
            phone: Some("0901234567".to_string()),
            table_id: Some(table.id),
            items: vec![bistro_api::services::orders::OrderLineRequest {
                dish_id: Some(dish.id),
                combo_id: None,
                quantity: 1,
                notes: None,
            }],
            notes: None,
        })
        .await
        .unwrap();

    app.services
        .tables
        .update_status(table.id, TableStatus::Available)
        .await
        .unwrap();
    let err = app
        .services
        .tables
        .update_status(table.id, TableStatus::Occupied)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    let err = app
        .services
        .tables
        .update_status(Uuid::new_v4(), TableStatus::Occupied)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
