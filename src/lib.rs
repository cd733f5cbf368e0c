//! Bistro API Library
//!
//! Restaurant point-of-sale backend: tables, orders, reservations,
//! promotions, invoicing and payments.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod money;
pub mod openapi;
pub mod scheduler;
pub mod services;

use axum::{
    routing::{get, post, put},
    Router,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response envelope
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }
}

/// All versioned API routes. Layers (trace, cors, timeouts) are applied
/// by the binary on the assembled router.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/staff", post(handlers::auth::create_staff))
        .route("/auth/codes", post(handlers::auth::issue_code))
        .route("/auth/codes/verify", post(handlers::auth::verify_code))
        // Catalog
        .route(
            "/categories",
            get(handlers::catalog::list_categories).post(handlers::catalog::create_category),
        )
        .route(
            "/dishes",
            get(handlers::catalog::list_dishes).post(handlers::catalog::create_dish),
        )
        .route(
            "/dishes/{id}",
            get(handlers::catalog::get_dish).put(handlers::catalog::update_dish),
        )
        .route(
            "/combos",
            get(handlers::catalog::list_combos).post(handlers::catalog::create_combo),
        )
        .route("/combos/{id}/items", get(handlers::catalog::get_combo_items))
        // Tables
        .route(
            "/areas",
            get(handlers::tables::list_areas).post(handlers::tables::create_area),
        )
        .route(
            "/tables",
            get(handlers::tables::list_tables).post(handlers::tables::create_table),
        )
        .route("/tables/available", get(handlers::tables::get_available_tables))
        .route(
            "/tables/by-status/{status}",
            get(handlers::tables::get_tables_by_status),
        )
        .route(
            "/tables/by-area/{area_id}",
            get(handlers::tables::get_tables_by_area),
        )
        .route("/tables/merge", post(handlers::tables::merge_tables))
        .route("/tables/split", post(handlers::tables::split_table))
        .route("/tables/groups", post(handlers::tables::create_group))
        .route(
            "/tables/groups/{id}",
            get(handlers::tables::get_tables_in_group).delete(handlers::tables::disband_group),
        )
        .route("/tables/{id}", get(handlers::tables::get_table))
        .route(
            "/tables/{id}/status",
            put(handlers::tables::update_table_status),
        )
        // Orders
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/active", get(handlers::orders::get_active_orders))
        .route(
            "/orders/by-table/{table_id}",
            get(handlers::orders::get_orders_by_table),
        )
        .route("/orders/{id}", get(handlers::orders::get_order))
        .route(
            "/orders/{id}/status",
            put(handlers::orders::update_order_status),
        )
        .route("/orders/{id}/items", post(handlers::orders::add_order_item))
        .route(
            "/orders/{id}/items/{item_id}",
            put(handlers::orders::update_order_item)
                .delete(handlers::orders::remove_order_item),
        )
        .route(
            "/orders/{id}/items/{item_id}/status",
            put(handlers::orders::update_order_item_status),
        )
        // Promotions
        .route(
            "/promotions",
            get(handlers::promotions::list_promotions).post(handlers::promotions::create_promotion),
        )
        .route(
            "/promotions/valid",
            get(handlers::promotions::list_valid_promotions),
        )
        .route(
            "/promotions/{id}",
            get(handlers::promotions::get_promotion)
                .put(handlers::promotions::update_promotion)
                .delete(handlers::promotions::delete_promotion),
        )
        .route(
            "/orders/{id}/promotions",
            post(handlers::promotions::apply_promotion),
        )
        // Invoicing & payments
        .route("/orders/{id}/invoice", post(handlers::invoices::generate_invoice))
        .route("/orders/{id}/discount", post(handlers::invoices::apply_discount))
        .route("/orders/{id}/payments", post(handlers::invoices::process_payment))
        .route(
            "/orders/{id}/complete-payment",
            post(handlers::invoices::process_complete_payment),
        )
        .route(
            "/payment-methods",
            get(handlers::invoices::list_payment_methods)
                .post(handlers::invoices::create_payment_method),
        )
        .route("/invoices/{id}", get(handlers::invoices::get_invoice))
        .route(
            "/invoices/{id}/receipt",
            get(handlers::invoices::export_receipt),
        )
        // Reservations
        .route(
            "/reservations",
            get(handlers::reservations::list_reservations)
                .post(handlers::reservations::create_reservation),
        )
        .route(
            "/reservations/{id}",
            get(handlers::reservations::get_reservation),
        )
        .route(
            "/reservations/{id}/confirm",
            post(handlers::reservations::confirm_reservation),
        )
        .route(
            "/reservations/{id}/cancel",
            post(handlers::reservations::cancel_reservation),
        )
        .route(
            "/reservations/{id}/check-in",
            post(handlers::reservations::check_in),
        )
}

async fn serve_openapi() -> axum::Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi;
    axum::Json(openapi::ApiDoc::openapi())
}

/// Assembles the full application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(serve_openapi))
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
}
