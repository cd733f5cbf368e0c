use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        area, dining_table,
        dining_table::TableStatus,
        order,
        order::OrderStatus,
        table_group, table_group_member,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Conditional status transition: moves the table to `to` only when its
/// current status is one of `from`. Returns whether a row changed, which
/// is how concurrent check-and-set races are decided.
pub(crate) async fn transition_table<C: ConnectionTrait>(
    conn: &C,
    table_id: Uuid,
    from: &[TableStatus],
    to: TableStatus,
) -> Result<bool, ServiceError> {
    let result = dining_table::Entity::update_many()
        .col_expr(dining_table::Column::Status, Expr::value(to))
        .col_expr(
            dining_table::Column::UpdatedAt,
            Expr::value(Some(Utc::now())),
        )
        .filter(dining_table::Column::Id.eq(table_id))
        .filter(dining_table::Column::Status.is_in(from.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Occupy an Available table; the loser of a concurrent seat race gets
/// `Conflict`.
pub(crate) async fn occupy_table<C: ConnectionTrait>(
    conn: &C,
    table_id: Uuid,
) -> Result<(), ServiceError> {
    if transition_table(conn, table_id, &[TableStatus::Available], TableStatus::Occupied).await? {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "Table {} is not available",
            table_id
        )))
    }
}

/// Release a table back to Available. Idempotent: releasing an already
/// Available table is a no-op.
pub(crate) async fn release_table<C: ConnectionTrait>(
    conn: &C,
    table_id: Uuid,
) -> Result<(), ServiceError> {
    transition_table(
        conn,
        table_id,
        &[TableStatus::Occupied, TableStatus::Reserved],
        TableStatus::Available,
    )
    .await?;
    Ok(())
}

pub(crate) async fn reserve_table<C: ConnectionTrait>(
    conn: &C,
    table_id: Uuid,
) -> Result<(), ServiceError> {
    if transition_table(conn, table_id, &[TableStatus::Available], TableStatus::Reserved).await? {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "Table {} is not available for reservation",
            table_id
        )))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateAreaRequest {
    #[validate(length(min = 1, max = 100, message = "Area name is required"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTableRequest {
    #[validate(length(min = 1, max = 100, message = "Table name is required"))]
    pub name: String,
    pub area_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: i32,
    #[serde(default)]
    pub is_window: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct GroupTablesRequest {
    #[validate(length(min = 2, message = "A table group needs at least 2 tables"))]
    pub table_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TableResponse {
    pub id: Uuid,
    pub name: String,
    pub area_id: Option<Uuid>,
    pub status: String,
    pub capacity: i32,
    pub is_window: bool,
    pub notes: Option<String>,
}

impl From<dining_table::Model> for TableResponse {
    fn from(model: dining_table::Model) -> Self {
        use sea_orm::ActiveEnum;
        Self {
            id: model.id,
            name: model.name,
            area_id: model.area_id,
            status: model.status.to_value(),
            capacity: model.capacity,
            is_window: model.is_window,
            notes: model.notes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TableGroupResponse {
    pub id: Uuid,
    pub table_ids: Vec<Uuid>,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

/// Registry of physical tables, their occupancy state and merged-seating
/// groups.
#[derive(Clone)]
pub struct TableService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl TableService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send table event");
            }
        }
    }

    #[instrument(skip(self, request))]
    pub async fn create_area(
        &self,
        request: CreateAreaRequest,
    ) -> Result<area::Model, ServiceError> {
        request.validate()?;
        let model = area::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn list_areas(&self) -> Result<Vec<area::Model>, ServiceError> {
        Ok(area::Entity::find()
            .order_by_asc(area::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request))]
    pub async fn create_table(
        &self,
        request: CreateTableRequest,
    ) -> Result<dining_table::Model, ServiceError> {
        request.validate()?;
        if let Some(area_id) = request.area_id {
            area::Entity::find_by_id(area_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Area {} not found", area_id)))?;
        }
        let model = dining_table::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            area_id: Set(request.area_id),
            status: Set(TableStatus::Available),
            capacity: Set(request.capacity),
            is_window: Set(request.is_window),
            notes: Set(request.notes),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };
        Ok(model.insert(&*self.db).await?)
    }

    pub async fn get_table(&self, table_id: Uuid) -> Result<dining_table::Model, ServiceError> {
        dining_table::Entity::find_by_id(table_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))
    }

    pub async fn list_tables(&self) -> Result<Vec<dining_table::Model>, ServiceError> {
        Ok(dining_table::Entity::find()
            .order_by_asc(dining_table::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_available_tables(&self) -> Result<Vec<dining_table::Model>, ServiceError> {
        self.get_tables_by_status(TableStatus::Available).await
    }

    pub async fn get_tables_by_status(
        &self,
        status: TableStatus,
    ) -> Result<Vec<dining_table::Model>, ServiceError> {
        Ok(dining_table::Entity::find()
            .filter(dining_table::Column::Status.eq(status))
            .order_by_asc(dining_table::Column::Name)
            .all(&*self.db)
            .await?)
    }

    pub async fn get_tables_by_area(
        &self,
        area_id: Uuid,
    ) -> Result<Vec<dining_table::Model>, ServiceError> {
        Ok(dining_table::Entity::find()
            .filter(dining_table::Column::AreaId.eq(area_id))
            .order_by_asc(dining_table::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Staff override for table status. Occupying checks for seat races
    /// and for active orders still bound to the table; the loser gets
    /// `Conflict` instead of silently overwriting.
    #[instrument(skip(self), fields(table_id = %table_id, new_status = ?new_status))]
    pub async fn update_status(
        &self,
        table_id: Uuid,
        new_status: TableStatus,
    ) -> Result<dining_table::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let table = dining_table::Entity::find_by_id(table_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;

        if table.status == new_status {
            txn.commit().await?;
            return Ok(table);
        }

        // Double-seating guard: a table with an active order must not be
        // handed to another party even if its status row says Available.
        if new_status == TableStatus::Occupied {
            let active_orders = order::Entity::find()
                .filter(order::Column::TableId.eq(table_id))
                .filter(order::Column::Status.is_in([OrderStatus::Pending, OrderStatus::InProgress]))
                .count(&txn)
                .await?;
            if active_orders > 0 {
                return Err(ServiceError::Conflict(format!(
                    "Table {} still has an active order",
                    table_id
                )));
            }
        }

        let changed = transition_table(&txn, table_id, &[table.status], new_status).await?;
        if !changed {
            return Err(ServiceError::Conflict(format!(
                "Table {} status changed concurrently",
                table_id
            )));
        }

        let updated = dining_table::Entity::find_by_id(table_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;
        txn.commit().await?;

        info!(table_id = %table_id, status = ?new_status, "table status updated");
        match new_status {
            TableStatus::Occupied => self.emit(Event::TableOccupied(table_id)).await,
            TableStatus::Available => self.emit(Event::TableReleased(table_id)).await,
            TableStatus::Reserved => {}
        }

        Ok(updated)
    }

    /// Creates a table group (merge/split seating) with membership rows
    /// for every listed table.
    #[instrument(skip(self, request), fields(count = request.table_ids.len()))]
    pub async fn create_group(
        &self,
        request: GroupTablesRequest,
    ) -> Result<TableGroupResponse, ServiceError> {
        request.validate()?;

        let mut unique_ids = request.table_ids.clone();
        unique_ids.sort();
        unique_ids.dedup();
        if unique_ids.len() < 2 {
            return Err(ServiceError::ValidationError(
                "A table group needs at least 2 distinct tables".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let found = dining_table::Entity::find()
            .filter(dining_table::Column::Id.is_in(unique_ids.clone()))
            .all(&txn)
            .await?;
        if found.len() != unique_ids.len() {
            let found_ids: Vec<Uuid> = found.iter().map(|t| t.id).collect();
            let missing = unique_ids
                .iter()
                .find(|id| !found_ids.contains(id))
                .copied();
            return Err(ServiceError::NotFound(format!(
                "Table {} not found",
                missing.unwrap_or_default()
            )));
        }

        let already_grouped = table_group_member::Entity::find()
            .filter(table_group_member::Column::TableId.is_in(unique_ids.clone()))
            .count(&txn)
            .await?;
        if already_grouped > 0 {
            return Err(ServiceError::Conflict(
                "One of the tables already belongs to a group".to_string(),
            ));
        }

        let group = table_group::ActiveModel {
            id: Set(Uuid::new_v4()),
            created_by: Set(request.created_by),
            notes: Set(request.notes),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        for table_id in &unique_ids {
            table_group_member::ActiveModel {
                id: Set(Uuid::new_v4()),
                group_id: Set(group.id),
                table_id: Set(*table_id),
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;

        info!(group_id = %group.id, tables = unique_ids.len(), "table group created");
        self.emit(Event::TableGroupCreated(group.id)).await;

        Ok(TableGroupResponse {
            id: group.id,
            table_ids: unique_ids,
            created_by: group.created_by,
            notes: group.notes,
            created_at: group.created_at,
        })
    }

    /// Deletes the group and its membership rows. Member tables keep
    /// their last individual status.
    #[instrument(skip(self), fields(group_id = %group_id))]
    pub async fn disband_group(&self, group_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        table_group::Entity::find_by_id(group_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table group {} not found", group_id)))?;

        table_group_member::Entity::delete_many()
            .filter(table_group_member::Column::GroupId.eq(group_id))
            .exec(&txn)
            .await?;
        table_group::Entity::delete_by_id(group_id).exec(&txn).await?;

        txn.commit().await?;
        info!(group_id = %group_id, "table group disbanded");
        self.emit(Event::TableGroupDisbanded(group_id)).await;
        Ok(())
    }

    pub async fn get_tables_in_group(
        &self,
        group_id: Uuid,
    ) -> Result<Vec<dining_table::Model>, ServiceError> {
        table_group::Entity::find_by_id(group_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Table group {} not found", group_id)))?;

        let member_ids: Vec<Uuid> = table_group_member::Entity::find()
            .filter(table_group_member::Column::GroupId.eq(group_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|m| m.table_id)
            .collect();

        Ok(dining_table::Entity::find()
            .filter(dining_table::Column::Id.is_in(member_ids))
            .order_by_asc(dining_table::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// First-fit table allocation for reservations: the smallest
    /// Available table that seats the party, window tables last so they
    /// stay free for walk-ins.
    pub async fn allocate_table(
        &self,
        party_size: i32,
    ) -> Result<Option<dining_table::Model>, ServiceError> {
        find_allocatable(&*self.db, party_size).await
    }
}

/// Allocation query shared with the reservation flow so it can run
/// inside that flow's transaction.
pub(crate) async fn find_allocatable<C: ConnectionTrait>(
    conn: &C,
    party_size: i32,
) -> Result<Option<dining_table::Model>, ServiceError> {
    Ok(dining_table::Entity::find()
        .filter(dining_table::Column::Status.eq(TableStatus::Available))
        .filter(dining_table::Column::Capacity.gte(party_size))
        .order_by_asc(dining_table::Column::IsWindow)
        .order_by_asc(dining_table::Column::Capacity)
        .order_by_asc(dining_table::Column::Name)
        .one(conn)
        .await?)
}
