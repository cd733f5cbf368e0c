use crate::{
    config::AppConfig,
    db::DbPool,
    entities::{
        dining_table::{self, TableStatus},
        order::OrderType,
        reservation::{self, ActiveModel as ReservationActiveModel, ReservationStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::{CreateOrderRequest, OrderResponse, OrderService},
    services::tables::{find_allocatable, transition_table, TableResponse},
};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Booking rules lifted from configuration: operating hours, booking
/// horizon and the sweep grace period.
#[derive(Debug, Clone)]
pub struct OperatingRules {
    pub opening: NaiveTime,
    pub closing: NaiveTime,
    pub max_advance_days: i64,
    pub grace_minutes: i64,
}

impl From<&AppConfig> for OperatingRules {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            opening: cfg.opening_time(),
            closing: cfg.closing_time(),
            max_advance_days: cfg.reservation_max_advance_days,
            grace_minutes: cfg.reservation_grace_minutes,
        }
    }
}

/// Each violated rule fails with its own message so the UI can tell the
/// customer what to fix.
pub(crate) fn validate_reservation_time(
    rules: &OperatingRules,
    now: DateTime<Utc>,
    reserved_at: DateTime<Utc>,
) -> Result<(), ServiceError> {
    if reserved_at <= now {
        return Err(ServiceError::ValidationError(
            "Reservation time is in the past".to_string(),
        ));
    }
    if reserved_at > now + Duration::days(rules.max_advance_days) {
        return Err(ServiceError::ValidationError(format!(
            "Reservations can be made at most {} days ahead",
            rules.max_advance_days
        )));
    }
    let time_of_day = reserved_at.time();
    if time_of_day < rules.opening || time_of_day > rules.closing {
        return Err(ServiceError::ValidationError(format!(
            "Reservation time is outside operating hours ({}-{})",
            rules.opening.format("%H:%M"),
            rules.closing.format("%H:%M"),
        )));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReservationRequest {
    #[validate(length(min = 1, max = 200, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, max = 50, message = "Phone number is required"))]
    pub phone: String,
    pub table_id: Option<Uuid>,
    pub reserved_at: DateTime<Utc>,
    #[validate(range(min = 1, message = "Party size must be at least 1"))]
    pub party_size: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReservationResponse {
    pub id: Uuid,
    pub customer_name: String,
    pub phone: String,
    pub table_id: Option<Uuid>,
    pub reserved_at: DateTime<Utc>,
    pub party_size: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<reservation::Model> for ReservationResponse {
    fn from(model: reservation::Model) -> Self {
        Self {
            id: model.id,
            customer_name: model.customer_name,
            phone: model.phone,
            table_id: model.table_id,
            reserved_at: model.reserved_at,
            party_size: model.party_size,
            status: model.status.to_value(),
            notes: model.notes,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckInResponse {
    pub reservation: ReservationResponse,
    pub order: OrderResponse,
    pub table: TableResponse,
}

/// Reservation lifecycle plus the periodic sweep that cancels overdue
/// pending reservations.
#[derive(Clone)]
pub struct ReservationService {
    db: Arc<DbPool>,
    orders: Arc<OrderService>,
    rules: OperatingRules,
    event_sender: Option<Arc<EventSender>>,
}

impl ReservationService {
    pub fn new(
        db: Arc<DbPool>,
        orders: Arc<OrderService>,
        rules: OperatingRules,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            orders,
            rules,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send reservation event");
            }
        }
    }

    #[instrument(skip(self, request), fields(customer = %request.customer_name))]
    pub async fn create_reservation(
        &self,
        request: CreateReservationRequest,
    ) -> Result<ReservationResponse, ServiceError> {
        request.validate()?;
        validate_reservation_time(&self.rules, Utc::now(), request.reserved_at)?;

        let txn = self.db.begin().await?;

        if let Some(table_id) = request.table_id {
            let table = dining_table::Entity::find_by_id(table_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;
            if table.capacity < request.party_size {
                return Err(ServiceError::ValidationError(format!(
                    "Table '{}' only seats {}",
                    table.name, table.capacity
                )));
            }
            crate::services::tables::reserve_table(&txn, table_id).await?;
        }

        let now = Utc::now();
        let model = ReservationActiveModel {
            id: Set(Uuid::new_v4()),
            customer_name: Set(request.customer_name),
            phone: Set(request.phone),
            table_id: Set(request.table_id),
            reserved_at: Set(request.reserved_at),
            party_size: Set(request.party_size),
            status: Set(ReservationStatus::Pending),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };
        let created = model.insert(&txn).await?;
        txn.commit().await?;

        info!(reservation_id = %created.id, "reservation created");
        self.emit(Event::ReservationCreated(created.id)).await;

        Ok(created.into())
    }

    /// Pending -> Confirmed. Allocates a table when none was requested;
    /// allocation is best-effort and the reservation stays unassigned if
    /// nothing fits.
    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn confirm_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<ReservationResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let reservation = self.load(&txn, reservation_id).await?;
        if reservation.status != ReservationStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Reservation {} is {}",
                reservation_id,
                reservation.status.to_value()
            )));
        }

        let mut table_id = reservation.table_id;
        if table_id.is_none() {
            if let Some(table) = find_allocatable(&txn, reservation.party_size).await? {
                crate::services::tables::reserve_table(&txn, table.id).await?;
                table_id = Some(table.id);
            }
        }

        let mut active: ReservationActiveModel = reservation.into();
        active.status = Set(ReservationStatus::Confirmed);
        active.table_id = Set(table_id);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        info!(reservation_id = %reservation_id, ?table_id, "reservation confirmed");
        Ok(updated.into())
    }

    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn cancel_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<ReservationResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let reservation = self.load(&txn, reservation_id).await?;
        if !matches!(
            reservation.status,
            ReservationStatus::Pending | ReservationStatus::Confirmed
        ) {
            return Err(ServiceError::Conflict(format!(
                "Reservation {} is {}",
                reservation_id,
                reservation.status.to_value()
            )));
        }

        if let Some(table_id) = reservation.table_id {
            // Only free the hold this reservation placed.
            transition_table(&txn, table_id, &[TableStatus::Reserved], TableStatus::Available)
                .await?;
        }

        let mut active: ReservationActiveModel = reservation.into();
        active.status = Set(ReservationStatus::Cancelled);
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        info!(reservation_id = %reservation_id, "reservation cancelled");
        self.emit(Event::ReservationCancelled(reservation_id)).await;
        Ok(updated.into())
    }

    /// Seats the party: transitions the reservation to CheckedIn,
    /// occupies the table and opens a dine-in order bound to it, all in
    /// one transaction.
    #[instrument(skip(self), fields(reservation_id = %reservation_id))]
    pub async fn check_in(
        &self,
        reservation_id: Uuid,
        table_id: Option<Uuid>,
    ) -> Result<CheckInResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let reservation = self.load(&txn, reservation_id).await?;
        if !matches!(
            reservation.status,
            ReservationStatus::Pending | ReservationStatus::Confirmed
        ) {
            return Err(ServiceError::Conflict(format!(
                "Reservation {} is {}",
                reservation_id,
                reservation.status.to_value()
            )));
        }

        let table_id = match table_id.or(reservation.table_id) {
            Some(id) => id,
            None => find_allocatable(&txn, reservation.party_size)
                .await?
                .map(|t| t.id)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "No table available for a party of {}",
                        reservation.party_size
                    ))
                })?,
        };

        dining_table::Entity::find_by_id(table_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;

        // Drop this reservation's hold so order creation can win the
        // regular occupy check-and-set.
        transition_table(&txn, table_id, &[TableStatus::Reserved], TableStatus::Available).await?;

        let (order, items) = self
            .orders
            .create_order_in(
                &txn,
                CreateOrderRequest {
                    order_type: OrderType::DineIn,
                    customer_name: Some(reservation.customer_name.clone()),
                    phone: Some(reservation.phone.clone()),
                    table_id: Some(table_id),
                    items: Vec::new(),
                    notes: reservation.notes.clone(),
                },
                true,
            )
            .await?;

        let mut active: ReservationActiveModel = reservation.into();
        active.status = Set(ReservationStatus::CheckedIn);
        active.table_id = Set(Some(table_id));
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        let table = dining_table::Entity::find_by_id(table_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;

        txn.commit().await?;

        info!(reservation_id = %reservation_id, order_id = %order.id, %table_id, "reservation checked in");
        self.emit(Event::ReservationCheckedIn {
            reservation_id,
            order_id: order.id,
        })
        .await;
        self.emit(Event::TableOccupied(table_id)).await;

        Ok(CheckInResponse {
            reservation: updated.into(),
            order: OrderResponse::from_models(order, items),
            table: table.into(),
        })
    }

    pub async fn get_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<ReservationResponse, ServiceError> {
        Ok(self.load(&*self.db, reservation_id).await?.into())
    }

    pub async fn list_reservations(&self) -> Result<Vec<ReservationResponse>, ServiceError> {
        Ok(reservation::Entity::find()
            .order_by_asc(reservation::Column::ReservedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(ReservationResponse::from)
            .collect())
    }

    /// The sweep: pending reservations whose time is more than the grace
    /// period in the past are cancelled in bulk and their table holds
    /// freed.
    #[instrument(skip(self))]
    pub async fn sweep_overdue(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let cutoff = now - Duration::minutes(self.rules.grace_minutes);
        let txn = self.db.begin().await?;

        let overdue = reservation::Entity::find()
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending))
            .filter(reservation::Column::ReservedAt.lt(cutoff))
            .all(&txn)
            .await?;
        if overdue.is_empty() {
            txn.commit().await?;
            return Ok(0);
        }

        let ids: Vec<Uuid> = overdue.iter().map(|r| r.id).collect();
        let held_tables: Vec<Uuid> = overdue.iter().filter_map(|r| r.table_id).collect();

        let result = reservation::Entity::update_many()
            .col_expr(
                reservation::Column::Status,
                Expr::value(ReservationStatus::Cancelled),
            )
            .col_expr(reservation::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(reservation::Column::Id.is_in(ids))
            .filter(reservation::Column::Status.eq(ReservationStatus::Pending))
            .exec(&txn)
            .await?;

        if !held_tables.is_empty() {
            dining_table::Entity::update_many()
                .col_expr(
                    dining_table::Column::Status,
                    Expr::value(TableStatus::Available),
                )
                .col_expr(dining_table::Column::UpdatedAt, Expr::value(Some(now)))
                .filter(dining_table::Column::Id.is_in(held_tables))
                .filter(dining_table::Column::Status.eq(TableStatus::Reserved))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        let cancelled = result.rows_affected;
        info!(cancelled, "reservation sweep finished");
        self.emit(Event::ReservationsSwept {
            cancelled,
            swept_at: now,
        })
        .await;

        Ok(cancelled)
    }

    async fn load<C: ConnectionTrait>(
        &self,
        conn: &C,
        reservation_id: Uuid,
    ) -> Result<reservation::Model, ServiceError> {
        reservation::Entity::find_by_id(reservation_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Reservation {} not found", reservation_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> OperatingRules {
        OperatingRules {
            opening: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            closing: NaiveTime::from_hms_opt(20, 30, 0).unwrap(),
            max_advance_days: 7,
            grace_minutes: 30,
        }
    }

    fn at(now: DateTime<Utc>, days: i64, hour: u32, minute: u32) -> DateTime<Utc> {
        (now + Duration::days(days))
            .date_naive()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn rejects_time_in_the_past() {
        let now = Utc::now();
        let err = validate_reservation_time(&rules(), now, now - Duration::hours(1)).unwrap_err();
        assert!(err.to_string().contains("in the past"));
    }

    #[test]
    fn rejects_time_outside_operating_hours() {
        let now = Utc::now();
        let late = at(now, 2, 22, 0);
        let err = validate_reservation_time(&rules(), now, late).unwrap_err();
        assert!(err.to_string().contains("operating hours"));

        let early = at(now, 2, 6, 0);
        let err = validate_reservation_time(&rules(), now, early).unwrap_err();
        assert!(err.to_string().contains("operating hours"));
    }

    #[test]
    fn rejects_time_too_far_ahead() {
        let now = Utc::now();
        let err = validate_reservation_time(&rules(), now, at(now, 9, 12, 0)).unwrap_err();
        assert!(err.to_string().contains("days ahead"));
    }

    #[test]
    fn accepts_boundary_times() {
        let now = Utc::now();
        assert!(validate_reservation_time(&rules(), now, at(now, 2, 7, 30)).is_ok());
        assert!(validate_reservation_time(&rules(), now, at(now, 2, 20, 30)).is_ok());
        assert!(validate_reservation_time(&rules(), now, at(now, 2, 12, 0)).is_ok());
    }
}
