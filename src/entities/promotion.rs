use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A promotion code. `discount_percent` takes priority over
/// `discount_amount` when greater than zero. The validity window
/// [start_date, end_date] is inclusive by calendar date. `usage_limit`
/// is None for unlimited promotions and only ever decreases.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promotions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub usage_limit: Option<i32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// "Currently valid" predicate: active, today inside the window, and
    /// some usage left (or unlimited).
    pub fn is_currently_valid(&self, today: NaiveDate) -> bool {
        self.active
            && today >= self.start_date
            && today <= self.end_date
            && self.usage_limit.map_or(true, |limit| limit > 0)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::promo_usage::Entity")]
    Usages,
}

impl Related<super::promo_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Usages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
