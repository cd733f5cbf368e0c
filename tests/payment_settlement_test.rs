//! Invoice generation idempotence, discount adjustment, payment
//! recording and the settlement path that releases the table.

mod common;

use bistro_api::{
    entities::dining_table::TableStatus,
    entities::order::OrderType,
    errors::ServiceError,
    services::invoicing::{ApplyDiscountRequest, CompletePaymentRequest, PaymentRequest},
    services::orders::{CreateOrderRequest, OrderLineRequest},
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

async fn seated_order(app: &TestApp) -> (Uuid, Uuid) {
    let table = app.seed_table(&format!("T-{}", Uuid::new_v4()), 4).await;
    let bass = app.seed_dish("Grilled Sea Bass", dec!(50.00)).await;
    let chicken = app.seed_dish("Lemongrass Chicken", dec!(30.00)).await;
    let order = app
        .services
        .orders
        .create_order(CreateOrderRequest {
            order_type: OrderType::DineIn,
            customer_name: Some("An Nguyen".to_string()),
            phone: Some("0901234567".to_string()),
            table_id: Some(table.id),
            items: vec![dish_line(bass.id, 1), dish_line(chicken.id, 1)],
            notes: None,
        })
        .await
        .expect("order");
    (order.id, table.id)
}

#[tokio::test]
async fn generate_invoice_is_idempotent() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;

    let first = app
        .services
        .invoicing
        .generate_invoice(order_id, None)
        .await
        .unwrap();
    let second = app
        .services
        .invoicing
        .generate_invoice(order_id, None)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.invoice_number, second.invoice_number);
    assert_eq!(first.subtotal, dec!(80.00));
    assert_eq!(first.final_total, dec!(80.00));
}

#[tokio::test]
async fn settlement_completes_the_order_and_frees_the_table() {
    let app = TestApp::new().await;
    let (order_id, table_id) = seated_order(&app).await;
    app.seed_promotion("SAVE10", dec!(10), dec!(0), Some(5)).await;
    let method = app.seed_payment_method("Cash").await;

    app.services
        .promotions
        .apply(order_id, "SAVE10")
        .await
        .unwrap();

    let settlement = app
        .services
        .invoicing
        .process_complete_payment(
            order_id,
            CompletePaymentRequest {
                method_id: method.id,
                notes: None,
            },
        )
        .await
        .expect("settlement");

    assert_eq!(settlement.order.status, "Completed");
    assert_eq!(settlement.order.final_total, dec!(72.00));
    assert_eq!(settlement.invoice.final_total, dec!(72.00));
    assert_eq!(settlement.invoice.payments.len(), 1);
    assert_eq!(settlement.invoice.payments[0].amount, dec!(72.00));

    let table = app.services.tables.get_table(table_id).await.unwrap();
    assert_eq!(table.status, TableStatus::Available);

    // Settling twice is a conflict.
    let err = app
        .services
        .invoicing
        .process_complete_payment(
            order_id,
            CompletePaymentRequest {
                method_id: method.id,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn payments_validate_against_the_outstanding_balance() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;
    let method = app.seed_payment_method("Card").await;

    // No invoice yet.
    let err = app
        .services
        .invoicing
        .process_payment(
            order_id,
            PaymentRequest {
                method_id: method.id,
                amount: dec!(10.00),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));

    app.services
        .invoicing
        .generate_invoice(order_id, None)
        .await
        .unwrap();

    // Overpayment is rejected.
    let err = app
        .services
        .invoicing
        .process_payment(
            order_id,
            PaymentRequest {
                method_id: method.id,
                amount: dec!(100.00),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // Partial payments accumulate.
    let invoice = app
        .services
        .invoicing
        .process_payment(
            order_id,
            PaymentRequest {
                method_id: method.id,
                amount: dec!(30.00),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.payments.len(), 1);

    let invoice = app
        .services
        .invoicing
        .process_payment(
            order_id,
            PaymentRequest {
                method_id: method.id,
                amount: dec!(50.00),
                notes: Some("split second half".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(invoice.payments.len(), 2);

    // Fully paid invoices accept nothing further.
    let err = app
        .services
        .invoicing
        .process_payment(
            order_id,
            PaymentRequest {
                method_id: method.id,
                amount: dec!(1.00),
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn manual_and_promotion_discounts_are_mutually_exclusive() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;
    app.seed_promotion("SAVE10", dec!(10), dec!(0), Some(5)).await;

    let order = app
        .services
        .invoicing
        .apply_discount(order_id, ApplyDiscountRequest { amount: dec!(5.00) })
        .await
        .unwrap();
    assert_eq!(order.discount_amount, dec!(5.00));
    assert_eq!(order.final_total, dec!(75.00));

    // Promotion after a manual discount.
    let err = app
        .services
        .promotions
        .apply(order_id, "SAVE10")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    // And a second manual discount.
    let err = app
        .services
        .invoicing
        .apply_discount(order_id, ApplyDiscountRequest { amount: dec!(2.00) })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn discount_adjustment_mirrors_into_the_unpaid_invoice() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;

    let invoice = app
        .services
        .invoicing
        .generate_invoice(order_id, None)
        .await
        .unwrap();
    assert_eq!(invoice.final_total, dec!(80.00));

    app.services
        .invoicing
        .apply_discount(order_id, ApplyDiscountRequest { amount: dec!(10.00) })
        .await
        .unwrap();

    let invoice = app.services.invoicing.get_invoice(invoice.id).await.unwrap();
    assert_eq!(invoice.discount_amount, dec!(10.00));
    assert_eq!(invoice.final_total, dec!(70.00));
}

#[tokio::test]
async fn paid_invoices_reject_discount_adjustment() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;
    let method = app.seed_payment_method("Cash").await;

    app.services
        .invoicing
        .generate_invoice(order_id, None)
        .await
        .unwrap();
    app.services
        .invoicing
        .process_payment(
            order_id,
            PaymentRequest {
                method_id: method.id,
                amount: dec!(20.00),
                notes: None,
            },
        )
        .await
        .unwrap();

    let err = app
        .services
        .invoicing
        .apply_discount(order_id, ApplyDiscountRequest { amount: dec!(10.00) })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn cancelled_orders_cannot_be_settled() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;
    let method = app.seed_payment_method("Cash").await;

    app.services
        .orders
        .update_status(order_id, bistro_api::entities::order::OrderStatus::Cancelled)
        .await
        .unwrap();

    let err = app
        .services
        .invoicing
        .process_complete_payment(
            order_id,
            CompletePaymentRequest {
                method_id: method.id,
                notes: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));
}

#[tokio::test]
async fn receipt_export_renders_the_invoice() {
    let app = TestApp::new().await;
    let (order_id, _) = seated_order(&app).await;
    let method = app.seed_payment_method("Cash").await;

    let settlement = app
        .services
        .invoicing
        .process_complete_payment(
            order_id,
            CompletePaymentRequest {
                method_id: method.id,
                notes: None,
            },
        )
        .await
        .unwrap();

    let bytes = app
        .services
        .invoicing
        .export_invoice_receipt(settlement.invoice.id)
        .await
        .unwrap();
    let text = String::from_utf8(bytes).unwrap();

    assert!(text.contains(&settlement.invoice.invoice_number));
    assert!(text.contains("Grilled Sea Bass"));
    assert!(text.contains("80.00"));
    assert!(text.contains("Paid (Cash)"));

    let err = app
        .services
        .invoicing
        .export_invoice_receipt(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}
