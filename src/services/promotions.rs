use crate::{
    db::DbPool,
    entities::{
        order::{self, ActiveModel as OrderActiveModel},
        order_item, promo_usage,
        promotion::{self, Entity as Promotion, Model as PromotionModel},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::{clamp_discount, final_total, round_money},
    services::orders::OrderResponse,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use sea_orm::sea_query::Expr;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePromotionRequest {
    #[validate(length(min = 1, max = 50, message = "Promotion code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Promotion name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub usage_limit: Option<i32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdatePromotionRequest {
    #[validate(length(min = 1, max = 200, message = "Promotion name is required"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub discount_percent: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub usage_limit: Option<Option<i32>>,
    pub active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PromotionResponse {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub usage_limit: Option<i32>,
    pub active: bool,
}

impl From<PromotionModel> for PromotionResponse {
    fn from(model: PromotionModel) -> Self {
        Self {
            id: model.id,
            code: model.code,
            name: model.name,
            description: model.description,
            discount_percent: model.discount_percent,
            discount_amount: model.discount_amount,
            start_date: model.start_date,
            end_date: model.end_date,
            usage_limit: model.usage_limit,
            active: model.active,
        }
    }
}

/// Computes the discount a promotion yields on a subtotal: percentage
/// takes priority over the fixed amount, rounded half-up to 2 decimals
/// and clamped so the final total never goes negative.
pub(crate) fn compute_discount(promotion: &PromotionModel, subtotal: Decimal) -> Decimal {
    let raw = if promotion.discount_percent > Decimal::ZERO {
        round_money(subtotal * promotion.discount_percent / Decimal::from(100))
    } else {
        round_money(promotion.discount_amount)
    };
    clamp_discount(subtotal, raw)
}

/// Promotion catalog plus the concurrency-sensitive redemption path.
#[derive(Clone)]
pub struct PromotionService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl PromotionService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send promotion event");
            }
        }
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        request: CreatePromotionRequest,
    ) -> Result<PromotionResponse, ServiceError> {
        request.validate()?;
        validate_discount_shape(
            request.discount_percent,
            request.discount_amount,
            request.start_date,
            request.end_date,
            request.usage_limit,
        )?;

        let code = normalize_code(&request.code);
        let existing = Promotion::find()
            .filter(promotion::Column::Code.eq(code.clone()))
            .count(&*self.db)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "Promotion code '{}' already exists",
                code
            )));
        }

        let model = promotion::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(request.name),
            description: Set(request.description),
            discount_percent: Set(request.discount_percent),
            discount_amount: Set(request.discount_amount),
            start_date: Set(request.start_date),
            end_date: Set(request.end_date),
            usage_limit: Set(request.usage_limit),
            active: Set(request.active),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        Ok(model.insert(&*self.db).await?.into())
    }

    #[instrument(skip(self, request), fields(promotion_id = %promotion_id))]
    pub async fn update(
        &self,
        promotion_id: Uuid,
        request: UpdatePromotionRequest,
    ) -> Result<PromotionResponse, ServiceError> {
        request.validate()?;
        let model = Promotion::find_by_id(promotion_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Promotion {} not found", promotion_id))
            })?;

        let percent = request.discount_percent.unwrap_or(model.discount_percent);
        let amount = request.discount_amount.unwrap_or(model.discount_amount);
        let start = request.start_date.unwrap_or(model.start_date);
        let end = request.end_date.unwrap_or(model.end_date);
        let limit = request.usage_limit.unwrap_or(model.usage_limit);
        validate_discount_shape(percent, amount, start, end, limit)?;

        let mut active: promotion::ActiveModel = model.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if request.description.is_some() {
            active.description = Set(request.description);
        }
        active.discount_percent = Set(percent);
        active.discount_amount = Set(amount);
        active.start_date = Set(start);
        active.end_date = Set(end);
        if let Some(limit) = request.usage_limit {
            active.usage_limit = Set(limit);
        }
        if let Some(flag) = request.active {
            active.active = Set(flag);
        }
        active.updated_at = Set(Some(Utc::now()));

        Ok(active.update(&*self.db).await?.into())
    }

    #[instrument(skip(self), fields(promotion_id = %promotion_id))]
    pub async fn delete(&self, promotion_id: Uuid) -> Result<(), ServiceError> {
        let result = Promotion::delete_by_id(promotion_id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Promotion {} not found",
                promotion_id
            )));
        }
        Ok(())
    }

    pub async fn get(&self, promotion_id: Uuid) -> Result<PromotionResponse, ServiceError> {
        Promotion::find_by_id(promotion_id)
            .one(&*self.db)
            .await?
            .map(PromotionResponse::from)
            .ok_or_else(|| ServiceError::NotFound(format!("Promotion {} not found", promotion_id)))
    }

    pub async fn list(&self) -> Result<Vec<PromotionResponse>, ServiceError> {
        Ok(Promotion::find()
            .order_by_desc(promotion::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(PromotionResponse::from)
            .collect())
    }

    /// Currently valid promotions, soonest-expiring first so the UI can
    /// surface urgent ones.
    pub async fn list_valid(&self) -> Result<Vec<PromotionResponse>, ServiceError> {
        let today = Utc::now().date_naive();
        Ok(Promotion::find()
            .filter(promotion::Column::Active.eq(true))
            .filter(promotion::Column::StartDate.lte(today))
            .filter(promotion::Column::EndDate.gte(today))
            .filter(
                promotion::Column::UsageLimit
                    .is_null()
                    .or(promotion::Column::UsageLimit.gt(0)),
            )
            .order_by_asc(promotion::Column::EndDate)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(PromotionResponse::from)
            .collect())
    }

    /// Redeems a promotion against an order.
    ///
    /// The promotion row is read under an exclusive lock so concurrent
    /// redemptions serialize, and the usage-limit decrement is guarded so
    /// a promotion with limit N never yields more than N usage records.
    /// Everything commits or nothing does.
    #[instrument(skip(self), fields(order_id = %order_id, code = %code))]
    pub async fn apply(&self, order_id: Uuid, code: &str) -> Result<OrderResponse, ServiceError> {
        let today = Utc::now().date_naive();
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} can no longer be discounted",
                order_id
            )));
        }
        if order.discount_amount > Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Order already has a discount".to_string(),
            ));
        }

        let code = normalize_code(code);
        let promotion = Promotion::find()
            .filter(promotion::Column::Code.eq(code.clone()))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Promotion '{}' not found", code)))?;

        if !promotion.active {
            return Err(ServiceError::ValidationError(
                "Promotion is inactive".to_string(),
            ));
        }
        if today < promotion.start_date {
            return Err(ServiceError::ValidationError(
                "Promotion has not started yet".to_string(),
            ));
        }
        if today > promotion.end_date {
            return Err(ServiceError::ValidationError(
                "Promotion has expired".to_string(),
            ));
        }
        if promotion.usage_limit.is_some_and(|limit| limit <= 0) {
            return Err(ServiceError::ValidationError(
                "Promotion usage limit reached".to_string(),
            ));
        }

        let discount = compute_discount(&promotion, order.subtotal);
        if discount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Promotion has no effect on this order".to_string(),
            ));
        }

        // Guarded decrement: even if the lock were lost, the limit can
        // never go below zero.
        if promotion.usage_limit.is_some() {
            let result = Promotion::update_many()
                .col_expr(
                    promotion::Column::UsageLimit,
                    Expr::col(promotion::Column::UsageLimit).sub(1),
                )
                .col_expr(promotion::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                .filter(promotion::Column::Id.eq(promotion.id))
                .filter(promotion::Column::UsageLimit.gt(0))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(ServiceError::ValidationError(
                    "Promotion usage limit reached".to_string(),
                ));
            }
        }

        let subtotal = order.subtotal;
        let phone = order.phone.clone();
        let version = order.version;

        let mut active: OrderActiveModel = order.into();
        active.discount_amount = Set(discount);
        active.final_total = Set(final_total(subtotal, discount));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        promo_usage::ActiveModel {
            id: Set(Uuid::new_v4()),
            promotion_id: Set(promotion.id),
            customer_phone: Set(phone),
            used_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        txn.commit().await?;

        info!(order_id = %order_id, promotion_id = %promotion.id, %discount, "promotion applied");
        self.emit(Event::PromotionRedeemed {
            promotion_id: promotion.id,
            order_id,
            discount,
        })
        .await;

        Ok(OrderResponse::from_models(updated, items))
    }
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn validate_discount_shape(
    percent: Decimal,
    amount: Decimal,
    start: NaiveDate,
    end: NaiveDate,
    usage_limit: Option<i32>,
) -> Result<(), ServiceError> {
    if percent < Decimal::ZERO || percent > Decimal::from(100) {
        return Err(ServiceError::ValidationError(
            "Discount percent must be between 0 and 100".to_string(),
        ));
    }
    if amount < Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Discount amount must not be negative".to_string(),
        ));
    }
    if percent == Decimal::ZERO && amount == Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Promotion needs a percentage or a fixed discount".to_string(),
        ));
    }
    if end < start {
        return Err(ServiceError::ValidationError(
            "Promotion end date is before its start date".to_string(),
        ));
    }
    if usage_limit.is_some_and(|limit| limit < 0) {
        return Err(ServiceError::ValidationError(
            "Usage limit must not be negative".to_string(),
        ));
    }
    Ok(())
}
