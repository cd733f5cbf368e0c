//! Promotion redemption: discount computation, usage-limit consumption,
//! single-discount enforcement and validity reason strings.

mod common;

use bistro_api::{
    entities::{order::OrderType, promo_usage},
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderLineRequest},
    services::promotions::CreatePromotionRequest,
};
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

async fn order_with_subtotal(app: &TestApp, dish_id: Uuid, quantity: i32) -> Uuid {
    app.services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Qr,
            customer_name: None,
            phone: Some("0900000001".to_string()),
            table_id: None,
            items: vec![OrderLineRequest {
                dish_id: Some(dish_id),
                combo_id: None,
                quantity,
                notes: None,
            }],
            notes: None,
        })
        .await
        .expect("order")
        .id
}

#[tokio::test]
async fn redemption_discounts_the_order_and_consumes_one_usage() {
    let app = TestApp::new().await;
    let dish = app.seed_dish("Tasting Menu", dec!(80.00)).await;
    let promo = app
        .seed_promotion("SAVE10", dec!(10), Decimal::ZERO, Some(5))
        .await;
    let order_id = order_with_subtotal(&app, dish.id, 1).await;

    let order = app
        .services
        .promotions
        .apply(order_id, "save10")
        .await
        .expect("redemption");

    assert_eq!(order.subtotal, dec!(80.00));
    assert_eq!(order.discount_amount, dec!(8.00));
    assert_eq!(order.final_total, dec!(72.00));

    let promo = app.services.promotions.get(promo.id).await.unwrap();
    assert_eq!(promo.usage_limit, Some(4));

    let usages = promo_usage::Entity::find()
        .filter(promo_usage::Column::PromotionId.eq(promo.id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(usages.len(), 1);
    assert_eq!(usages[0].customer_phone.as_deref(), Some("0900000001"));
}

#[tokio::test]
async fn an_order_carries_at_most_one_discount() {
    let app = TestApp::new().await;
    let dish = app.seed_dish("Tasting Menu", dec!(80.00)).await;
    app.seed_promotion("SAVE10", dec!(10), Decimal::ZERO, Some(5))
        .await;
    app.seed_promotion("TENOFF", Decimal::ZERO, dec!(10.00), None)
        .await;
    let order_id = order_with_subtotal(&app, dish.id, 1).await;

    app.services
        .promotions
        .apply(order_id, "SAVE10")
        .await
        .unwrap();

    let err = app
        .services
        .promotions
        .apply(order_id, "TENOFF")
        .await
        .unwrap_err();
    match err {
        ServiceError::ValidationError(msg) => {
            assert!(msg.contains("already has a discount"), "got: {msg}")
        }
        other => panic!("expected validation error, got: {other}"),
    }
}

#[tokio::test]
async fn usage_limit_is_never_oversubscribed() {
    let app = TestApp::new().await;
    let dish = app.seed_dish("Tasting Menu", dec!(80.00)).await;
    let promo = app
        .seed_promotion("LASTONE", dec!(10), Decimal::ZERO, Some(1))
        .await;

    let first = order_with_subtotal(&app, dish.id, 1).await;
    let second = order_with_subtotal(&app, dish.id, 1).await;

    app.services.promotions.apply(first, "LASTONE").await.unwrap();

    let err = app
        .services
        .promotions
        .apply(second, "LASTONE")
        .await
        .unwrap_err();
    match err {
        ServiceError::ValidationError(msg) => {
            assert!(msg.contains("usage limit reached"), "got: {msg}")
        }
        other => panic!("expected validation error, got: {other}"),
    }

    // Exactly one usage row, limit exhausted at zero.
    let promo = app.services.promotions.get(promo.id).await.unwrap();
    assert_eq!(promo.usage_limit, Some(0));
    let usages = promo_usage::Entity::find()
        .filter(promo_usage::Column::PromotionId.eq(promo.id))
        .all(&*app.db)
        .await
        .unwrap();
    assert_eq!(usages.len(), 1);
}

#[tokio::test]
async fn every_rejection_reason_is_distinguishable() {
    let app = TestApp::new().await;
    let dish = app.seed_dish("Tasting Menu", dec!(80.00)).await;
    let today = Utc::now().date_naive();

    let mk = |code: &str, start, end, active| CreatePromotionRequest {
        code: code.to_string(),
        name: code.to_string(),
        description: None,
        discount_percent: dec!(10),
        discount_amount: Decimal::ZERO,
        start_date: start,
        end_date: end,
        usage_limit: None,
        active,
    };

    app.services
        .promotions
        .create(mk(
            "SLEEPY",
            today - Duration::days(5),
            today + Duration::days(5),
            false,
        ))
        .await
        .unwrap();
    app.services
        .promotions
        .create(mk(
            "BYGONE",
            today - Duration::days(10),
            today - Duration::days(1),
            true,
        ))
        .await
        .unwrap();
    app.services
        .promotions
        .create(mk(
            "SOON",
            today + Duration::days(2),
            today + Duration::days(5),
            true,
        ))
        .await
        .unwrap();

    let expect_reason = |err: ServiceError, needle: &str| match err {
        ServiceError::ValidationError(msg) => {
            assert!(msg.contains(needle), "expected '{needle}' in '{msg}'")
        }
        other => panic!("expected validation error, got: {other}"),
    };

    let order = order_with_subtotal(&app, dish.id, 1).await;
    expect_reason(
        app.services.promotions.apply(order, "SLEEPY").await.unwrap_err(),
        "inactive",
    );
    expect_reason(
        app.services.promotions.apply(order, "BYGONE").await.unwrap_err(),
        "expired",
    );
    expect_reason(
        app.services.promotions.apply(order, "SOON").await.unwrap_err(),
        "not started",
    );

    let err = app
        .services
        .promotions
        .apply(order, "NOSUCHCODE")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    // A promotion with nothing to discount reports "no effect".
    app.seed_promotion("FIVER", Decimal::ZERO, dec!(5.00), None)
        .await;
    let empty_order = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::Qr,
            customer_name: None,
            phone: None,
            table_id: None,
            items: vec![],
            notes: None,
        })
        .await
        .unwrap()
        .id;
    expect_reason(
        app.services
            .promotions
            .apply(empty_order, "FIVER")
            .await
            .unwrap_err(),
        "no effect",
    );
}

#[tokio::test]
async fn valid_promotions_list_soonest_expiring_first() {
    let app = TestApp::new().await;
    let today = Utc::now().date_naive();

    let mk = |code: &str, end_in_days: i64| CreatePromotionRequest {
        code: code.to_string(),
        name: code.to_string(),
        description: None,
        discount_percent: dec!(5),
        discount_amount: Decimal::ZERO,
        start_date: today - Duration::days(1),
        end_date: today + Duration::days(end_in_days),
        usage_limit: None,
        active: true,
    };

    app.services.promotions.create(mk("LONGRUN", 14)).await.unwrap();
    app.services.promotions.create(mk("URGENT", 1)).await.unwrap();
    app.services.promotions.create(mk("MIDWAY", 7)).await.unwrap();
    // Depleted promotions are not "currently valid".
    app.seed_promotion("DEPLETED", dec!(5), Decimal::ZERO, Some(0))
        .await;

    let valid = app.services.promotions.list_valid().await.unwrap();
    let codes: Vec<&str> = valid.iter().map(|p| p.code.as_str()).collect();
    assert_eq!(codes, vec!["URGENT", "MIDWAY", "LONGRUN"]);
}

#[tokio::test]
async fn fixed_amount_discount_clamps_to_the_subtotal() {
    let app = TestApp::new().await;
    let dish = app.seed_dish("Iced Tea", dec!(3.00)).await;
    app.seed_promotion("BIGCUT", Decimal::ZERO, dec!(20.00), None)
        .await;
    let order_id = order_with_subtotal(&app, dish.id, 1).await;

    let order = app
        .services
        .promotions
        .apply(order_id, "BIGCUT")
        .await
        .unwrap();
    assert_eq!(order.discount_amount, dec!(3.00));
    assert_eq!(order.final_total, Decimal::ZERO);
}

#[tokio::test]
async fn duplicate_codes_are_rejected_case_insensitively() {
    let app = TestApp::new().await;
    app.seed_promotion("WELCOME", dec!(5), Decimal::ZERO, None)
        .await;

    let today = Utc::now().date_naive();
    let err = app
        .services
        .promotions
        .create(CreatePromotionRequest {
            code: "welcome".to_string(),
            name: "duplicate".to_string(),
            description: None,
            discount_percent: dec!(5),
            discount_amount: Decimal::ZERO,
            start_date: today,
            end_date: today + Duration::days(1),
            usage_limit: None,
            active: true,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}
