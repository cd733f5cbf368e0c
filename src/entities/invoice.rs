use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Billing snapshot of an order. At most one invoice exists per order
/// (unique index on `order_id`); amounts are copied from the order at
/// generation time and only change through the discount-adjustment path
/// before payment.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub invoice_number: String,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub issued_by: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::payment_record::Entity")]
    Payments,
}

impl Related<super::payment_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
