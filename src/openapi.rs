//! OpenAPI document aggregation.

use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::handlers;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bistro API",
        description = "Restaurant point-of-sale backend: tables, orders, reservations, promotions, invoicing and payments",
    ),
    paths(
        handlers::auth::login,
        handlers::auth::create_staff,
        handlers::auth::issue_code,
        handlers::auth::verify_code,
        handlers::catalog::create_category,
        handlers::catalog::list_categories,
        handlers::catalog::create_dish,
        handlers::catalog::list_dishes,
        handlers::catalog::get_dish,
        handlers::catalog::update_dish,
        handlers::catalog::create_combo,
        handlers::catalog::list_combos,
        handlers::catalog::get_combo_items,
        handlers::tables::create_area,
        handlers::tables::list_areas,
        handlers::tables::create_table,
        handlers::tables::list_tables,
        handlers::tables::get_available_tables,
        handlers::tables::get_tables_by_status,
        handlers::tables::get_tables_by_area,
        handlers::tables::get_table,
        handlers::tables::update_table_status,
        handlers::tables::merge_tables,
        handlers::tables::split_table,
        handlers::tables::create_group,
        handlers::tables::disband_group,
        handlers::tables::get_tables_in_group,
        handlers::orders::create_order,
        handlers::orders::get_active_orders,
        handlers::orders::get_order,
        handlers::orders::get_orders_by_table,
        handlers::orders::update_order_status,
        handlers::orders::add_order_item,
        handlers::orders::update_order_item,
        handlers::orders::remove_order_item,
        handlers::orders::update_order_item_status,
        handlers::promotions::create_promotion,
        handlers::promotions::list_promotions,
        handlers::promotions::list_valid_promotions,
        handlers::promotions::get_promotion,
        handlers::promotions::update_promotion,
        handlers::promotions::delete_promotion,
        handlers::promotions::apply_promotion,
        handlers::invoices::generate_invoice,
        handlers::invoices::apply_discount,
        handlers::invoices::process_payment,
        handlers::invoices::process_complete_payment,
        handlers::invoices::create_payment_method,
        handlers::invoices::list_payment_methods,
        handlers::invoices::get_invoice,
        handlers::invoices::export_receipt,
        handlers::reservations::create_reservation,
        handlers::reservations::list_reservations,
        handlers::reservations::get_reservation,
        handlers::reservations::confirm_reservation,
        handlers::reservations::cancel_reservation,
        handlers::reservations::check_in,
        handlers::health::health_check,
    ),
    components(schemas(
        ErrorResponse,
        handlers::health::HealthStatus,
        handlers::auth::IssueCodeRequest,
        handlers::auth::IssueCodeResponse,
        handlers::auth::VerifyCodeRequest,
        handlers::orders::UpdateStatusRequest,
        handlers::tables::UpdateTableStatusRequest,
        handlers::promotions::ApplyPromotionRequest,
        handlers::invoices::GenerateInvoiceRequest,
        handlers::reservations::CheckInRequest,
        services::auth::LoginRequest,
        services::auth::LoginResponse,
        services::auth::StaffResponse,
        services::auth::CreateStaffRequest,
        services::catalog::CreateCategoryRequest,
        services::catalog::CreateDishRequest,
        services::catalog::UpdateDishRequest,
        services::catalog::CreateComboRequest,
        services::catalog::ComboComponent,
        services::tables::CreateAreaRequest,
        services::tables::CreateTableRequest,
        services::tables::GroupTablesRequest,
        services::tables::TableResponse,
        services::tables::TableGroupResponse,
        services::orders::CreateOrderRequest,
        services::orders::OrderLineRequest,
        services::orders::UpdateLineRequest,
        services::orders::OrderResponse,
        services::orders::OrderLineResponse,
        services::promotions::CreatePromotionRequest,
        services::promotions::UpdatePromotionRequest,
        services::promotions::PromotionResponse,
        services::invoicing::ApplyDiscountRequest,
        services::invoicing::CreatePaymentMethodRequest,
        services::invoicing::PaymentRequest,
        services::invoicing::CompletePaymentRequest,
        services::invoicing::InvoiceResponse,
        services::invoicing::PaymentRecordResponse,
        services::invoicing::SettlementResponse,
        services::reservations::CreateReservationRequest,
        services::reservations::ReservationResponse,
        services::reservations::CheckInResponse,
    )),
    tags(
        (name = "bistro-api", description = "Restaurant POS backend")
    )
)]
pub struct ApiDoc;
