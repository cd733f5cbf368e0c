pub mod auth;
pub mod catalog;
pub mod health;
pub mod invoices;
pub mod orders;
pub mod promotions;
pub mod reservations;
pub mod tables;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    auth::AuthService, catalog::CatalogService, invoicing::InvoicingService, orders::OrderService,
    promotions::PromotionService, reservations::ReservationService, tables::TableService,
};

/// Container for all application services, wired once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub tables: Arc<TableService>,
    pub orders: Arc<OrderService>,
    pub promotions: Arc<PromotionService>,
    pub invoicing: Arc<InvoicingService>,
    pub reservations: Arc<ReservationService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let catalog = Arc::new(CatalogService::new(db_pool.clone()));
        let tables = Arc::new(TableService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            catalog.clone(),
            Some(event_sender.clone()),
        ));
        let promotions = Arc::new(PromotionService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let invoicing = Arc::new(InvoicingService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let reservations = Arc::new(ReservationService::new(
            db_pool.clone(),
            orders.clone(),
            config.into(),
            Some(event_sender.clone()),
        ));
        let auth = Arc::new(AuthService::new(
            db_pool,
            config.jwt_secret.clone(),
            config.jwt_expiry_secs,
        ));

        Self {
            catalog,
            tables,
            orders,
            promotions,
            invoicing,
            reservations,
            auth,
        }
    }
}
