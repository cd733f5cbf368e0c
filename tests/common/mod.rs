//! Test harness: application services backed by a throwaway SQLite
//! database, migrated through the real migrator.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use bistro_api::{
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::payment_method,
    events::{self, EventSender},
    handlers::AppServices,
    services::catalog::{CreateCategoryRequest, CreateDishRequest},
    services::invoicing::CreatePaymentMethodRequest,
    services::promotions::CreatePromotionRequest,
    services::tables::CreateTableRequest,
};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    db_path: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db_path =
            std::env::temp_dir().join(format!("bistro_test_{}.db", Uuid::new_v4().as_simple()));
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        // A single connection keeps every statement on the same SQLite
        // handle.
        let db_config = DbConfig {
            url,
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };
        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("test database");
        db::run_migrations(&pool).await.expect("migrations");
        let pool = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(1024);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let cfg = AppConfig::default();
        let services = AppServices::new(
            pool.clone(),
            Arc::new(EventSender::new(event_tx)),
            &cfg,
        );

        Self {
            db: pool,
            services,
            db_path,
            _event_task: event_task,
        }
    }

    pub async fn seed_dish(&self, name: &str, price: Decimal) -> bistro_api::entities::dish::Model {
        self.services
            .catalog
            .create_dish(CreateDishRequest {
                name: name.to_string(),
                category_id: None,
                price,
                description: None,
                image_ref: None,
            })
            .await
            .expect("seed dish")
    }

    pub async fn seed_category(&self, name: &str) -> bistro_api::entities::category::Model {
        self.services
            .catalog
            .create_category(CreateCategoryRequest {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed category")
    }

    pub async fn seed_table(
        &self,
        name: &str,
        capacity: i32,
    ) -> bistro_api::entities::dining_table::Model {
        self.seed_table_opts(name, capacity, false).await
    }

    pub async fn seed_table_opts(
        &self,
        name: &str,
        capacity: i32,
        is_window: bool,
    ) -> bistro_api::entities::dining_table::Model {
        self.services
            .tables
            .create_table(CreateTableRequest {
                name: name.to_string(),
                area_id: None,
                capacity,
                is_window,
                notes: None,
            })
            .await
            .expect("seed table")
    }

    pub async fn seed_payment_method(&self, name: &str) -> payment_method::Model {
        self.services
            .invoicing
            .create_payment_method(CreatePaymentMethodRequest {
                name: name.to_string(),
            })
            .await
            .expect("seed payment method")
    }

    /// Promotion valid from yesterday through next week.
    pub async fn seed_promotion(
        &self,
        code: &str,
        percent: Decimal,
        amount: Decimal,
        usage_limit: Option<i32>,
    ) -> bistro_api::services::promotions::PromotionResponse {
        let today = Utc::now().date_naive();
        self.services
            .promotions
            .create(CreatePromotionRequest {
                code: code.to_string(),
                name: format!("Promotion {}", code),
                description: None,
                discount_percent: percent,
                discount_amount: amount,
                start_date: today - Duration::days(1),
                end_date: today + Duration::days(7),
                usage_limit,
                active: true,
            })
            .await
            .expect("seed promotion")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = self.db_path.clone();
            sidecar.set_file_name(format!(
                "{}{}",
                self.db_path.file_name().unwrap().to_string_lossy(),
                suffix
            ));
            let _ = std::fs::remove_file(sidecar);
        }
    }
}
