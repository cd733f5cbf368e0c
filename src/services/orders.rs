use crate::{
    db::DbPool,
    entities::{
        order::{self, ActiveModel as OrderActiveModel, OrderStatus, OrderType},
        order_item::{self, ActiveModel as OrderItemActiveModel, OrderItemStatus},
        dining_table,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    money::{clamp_discount, final_total},
    services::catalog::{CatalogService, ItemRef},
    services::tables::{occupy_table, release_table},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// The "active" projection shared by the waiter and receptionist views:
/// everything that is not cancelled and not yet archived off the floor.
const ACTIVE_STATUSES: [OrderStatus; 3] = [
    OrderStatus::Pending,
    OrderStatus::InProgress,
    OrderStatus::Completed,
];

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    pub dish_id: Option<Uuid>,
    pub combo_id: Option<Uuid>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    pub order_type: OrderType,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub table_id: Option<Uuid>,
    #[validate(nested)]
    pub items: Vec<OrderLineRequest>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateLineRequest {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: Uuid,
    pub dish_id: Option<Uuid>,
    pub combo_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_type: String,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
    pub table_id: Option<Uuid>,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub status: String,
    pub refunded: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderLineResponse>,
}

impl OrderResponse {
    pub fn from_models(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            order_type: order.order_type.to_value(),
            customer_name: order.customer_name,
            phone: order.phone,
            table_id: order.table_id,
            subtotal: order.subtotal,
            discount_amount: order.discount_amount,
            final_total: order.final_total,
            status: order.status.to_value(),
            refunded: order.refunded,
            notes: order.notes,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: items
                .into_iter()
                .map(|item| OrderLineResponse {
                    id: item.id,
                    dish_id: item.dish_id,
                    combo_id: item.combo_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.unit_price * Decimal::from(item.quantity),
                    status: item.status.to_value(),
                    notes: item.notes,
                })
                .collect(),
        }
    }
}

/// Allowed order-level transitions: Pending -> InProgress -> Completed,
/// Pending|InProgress -> Cancelled. Terminal states accept nothing.
pub(crate) fn order_transition_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::InProgress)
            | (OrderStatus::InProgress, OrderStatus::Completed)
            | (OrderStatus::Pending, OrderStatus::Cancelled)
            | (OrderStatus::InProgress, OrderStatus::Cancelled)
    )
}

/// Kitchen line transitions: Pending -> Preparing -> Ready,
/// Pending|Preparing -> Cancelled.
pub(crate) fn item_transition_allowed(from: OrderItemStatus, to: OrderItemStatus) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (OrderItemStatus::Pending, OrderItemStatus::Preparing)
            | (OrderItemStatus::Preparing, OrderItemStatus::Ready)
            | (OrderItemStatus::Pending, OrderItemStatus::Cancelled)
            | (OrderItemStatus::Preparing, OrderItemStatus::Cancelled)
    )
}

/// Order lifecycle engine: creation, line management and status
/// transitions, coupled to table occupancy for dine-in orders.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    catalog: Arc<CatalogService>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        catalog: Arc<CatalogService>,
        event_sender: Option<Arc<EventSender>>,
    ) -> Self {
        Self {
            db,
            catalog,
            event_sender,
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send order event");
            }
        }
    }

    /// Creates an order, pricing every line from the catalog. A dine-in
    /// order with a table occupies it atomically; losing the seat race
    /// rolls the whole creation back.
    #[instrument(skip(self, request), fields(order_type = ?request.order_type))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;
        let (order, items) = self.create_order_in(&txn, request, false).await?;
        txn.commit().await?;

        info!(order_id = %order.id, "order created");
        let occupied_table = (order.order_type == OrderType::DineIn)
            .then_some(order.table_id)
            .flatten();
        self.emit(Event::OrderCreated(order.id)).await;
        if let Some(table_id) = occupied_table {
            self.emit(Event::TableOccupied(table_id)).await;
        }

        Ok(OrderResponse::from_models(order, items))
    }

    /// Transactional core of order creation, shared with the reservation
    /// check-in flow. `from_reservation` relaxes the customer-details
    /// requirement since the reservation already carries them.
    pub(crate) async fn create_order_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: CreateOrderRequest,
        from_reservation: bool,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        request.validate()?;

        let requires_customer = match request.order_type {
            OrderType::Takeaway => true,
            OrderType::DineIn => !from_reservation,
            OrderType::Qr => false,
        };
        if requires_customer {
            let name_ok = request
                .customer_name
                .as_deref()
                .is_some_and(|n| !n.trim().is_empty());
            let phone_ok = request
                .phone
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty());
            if !name_ok || !phone_ok {
                return Err(ServiceError::ValidationError(
                    "Customer name and phone are required".to_string(),
                ));
            }
        }

        if let Some(table_id) = request.table_id {
            if request.order_type != OrderType::DineIn {
                return Err(ServiceError::ValidationError(
                    "Only dine-in orders can be bound to a table".to_string(),
                ));
            }
            dining_table::Entity::find_by_id(table_id)
                .one(conn)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Table {} not found", table_id)))?;
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();

        // Price every line from the catalog before any write.
        let mut priced_lines = Vec::with_capacity(request.items.len());
        let mut subtotal = Decimal::ZERO;
        for line in &request.items {
            let item_ref = ItemRef::from_ids(line.dish_id, line.combo_id)?;
            let unit_price = self.catalog.price_of(conn, item_ref).await?;
            subtotal += unit_price * Decimal::from(line.quantity);
            priced_lines.push((line, unit_price));
        }

        let order_model = OrderActiveModel {
            id: Set(order_id),
            order_type: Set(request.order_type),
            customer_name: Set(request.customer_name.clone()),
            phone: Set(request.phone.clone()),
            table_id: Set(request.table_id),
            subtotal: Set(subtotal),
            discount_amount: Set(Decimal::ZERO),
            final_total: Set(subtotal),
            status: Set(OrderStatus::Pending),
            refunded: Set(false),
            notes: Set(request.notes.clone()),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(conn)
        .await?;

        let mut items = Vec::with_capacity(priced_lines.len());
        for (line, unit_price) in priced_lines {
            let item = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                dish_id: Set(line.dish_id),
                combo_id: Set(line.combo_id),
                quantity: Set(line.quantity),
                unit_price: Set(unit_price),
                status: Set(OrderItemStatus::Pending),
                refunded: Set(false),
                notes: Set(line.notes.clone()),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            }
            .insert(conn)
            .await?;
            items.push(item);
        }

        if request.order_type == OrderType::DineIn {
            if let Some(table_id) = request.table_id {
                occupy_table(conn, table_id).await?;
            }
        }

        Ok((order_model, items))
    }

    /// Adds a line to an editable order and recomputes the totals.
    #[instrument(skip(self, line), fields(order_id = %order_id))]
    pub async fn add_item(
        &self,
        order_id: Uuid,
        line: OrderLineRequest,
    ) -> Result<OrderResponse, ServiceError> {
        line.validate()?;
        let txn = self.db.begin().await?;

        let order = self.load_editable(&txn, order_id).await?;

        let item_ref = ItemRef::from_ids(line.dish_id, line.combo_id)?;
        let unit_price = self.catalog.price_of(&txn, item_ref).await?;

        let now = Utc::now();
        OrderItemActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            dish_id: Set(line.dish_id),
            combo_id: Set(line.combo_id),
            quantity: Set(line.quantity),
            unit_price: Set(unit_price),
            status: Set(OrderItemStatus::Pending),
            refunded: Set(false),
            notes: Set(line.notes),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await?;

        let (updated, items) = self.recompute_totals(&txn, order).await?;
        txn.commit().await?;

        Ok(OrderResponse::from_models(updated, items))
    }

    /// Changes quantity/notes of a line while the order is editable.
    #[instrument(skip(self, request), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn update_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        request: UpdateLineRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        let txn = self.db.begin().await?;

        let order = self.load_editable(&txn, order_id).await?;
        let item = self.load_item(&txn, order_id, item_id).await?;
        if item.status == OrderItemStatus::Cancelled {
            return Err(ServiceError::Conflict(format!(
                "Line item {} is cancelled",
                item_id
            )));
        }

        let mut active: OrderItemActiveModel = item.into();
        active.quantity = Set(request.quantity);
        if request.notes.is_some() {
            active.notes = Set(request.notes);
        }
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        let (updated, items) = self.recompute_totals(&txn, order).await?;
        txn.commit().await?;

        Ok(OrderResponse::from_models(updated, items))
    }

    /// Removes a line while the order is editable.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn remove_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = self.load_editable(&txn, order_id).await?;
        let item = self.load_item(&txn, order_id, item_id).await?;

        order_item::Entity::delete_by_id(item.id).exec(&txn).await?;

        let (updated, items) = self.recompute_totals(&txn, order).await?;
        txn.commit().await?;

        Ok(OrderResponse::from_models(updated, items))
    }

    /// Kitchen path: advances a single line independently of the order
    /// status. Cancelling a line re-prices the order.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id, new_status = ?new_status))]
    pub async fn update_item_status(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        new_status: OrderItemStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already {}",
                order_id,
                order.status.to_value()
            )));
        }

        let item = self.load_item(&txn, order_id, item_id).await?;
        if item.status == new_status {
            txn.commit().await?;
            let (order, items) = self.load_with_items(order_id).await?;
            return Ok(OrderResponse::from_models(order, items));
        }
        if !item_transition_allowed(item.status, new_status) {
            return Err(ServiceError::Conflict(format!(
                "Line item cannot move from {} to {}",
                item.status.to_value(),
                new_status.to_value()
            )));
        }

        let mut active: OrderItemActiveModel = item.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        active.update(&txn).await?;

        let (updated, items) = if new_status == OrderItemStatus::Cancelled {
            self.recompute_totals(&txn, order).await?
        } else {
            let items = self.items_of(&txn, order_id).await?;
            (order, items)
        };
        txn.commit().await?;

        self.emit(Event::ItemStatusChanged {
            order_id,
            item_id,
            new_status: new_status.to_value(),
        })
        .await;

        Ok(OrderResponse::from_models(updated, items))
    }

    /// Order-level status transition along the enforced graph.
    /// Cancelling a dine-in order releases its table; completion leaves
    /// the table to the settlement path.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = ?new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = order.status;
        if old_status == new_status {
            txn.commit().await?;
            let (order, items) = self.load_with_items(order_id).await?;
            return Ok(OrderResponse::from_models(order, items));
        }
        if !order_transition_allowed(old_status, new_status) {
            return Err(ServiceError::Conflict(format!(
                "Order cannot move from {} to {}",
                old_status.to_value(),
                new_status.to_value()
            )));
        }

        let table_id = order.table_id;
        let order_type = order.order_type;
        let version = order.version;

        let mut active: OrderActiveModel = order.into();
        active.status = Set(new_status);
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        let updated = active.update(&txn).await?;

        let mut released_table = None;
        if new_status == OrderStatus::Cancelled && order_type == OrderType::DineIn {
            if let Some(table_id) = table_id {
                release_table(&txn, table_id).await?;
                released_table = Some(table_id);
            }
        }

        let items = self.items_of(&txn, order_id).await?;
        txn.commit().await?;

        info!(order_id = %order_id, from = ?old_status, to = ?new_status, "order status updated");
        self.emit(Event::OrderStatusChanged {
            order_id,
            old_status: old_status.to_value(),
            new_status: new_status.to_value(),
        })
        .await;
        if new_status == OrderStatus::Cancelled {
            self.emit(Event::OrderCancelled(order_id)).await;
        }
        if let Some(table_id) = released_table {
            self.emit(Event::TableReleased(table_id)).await;
        }

        Ok(OrderResponse::from_models(updated, items))
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let (order, items) = self.load_with_items(order_id).await?;
        Ok(OrderResponse::from_models(order, items))
    }

    /// Orders still on the floor, newest first.
    pub async fn get_active_orders(&self) -> Result<Vec<OrderResponse>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::Status.is_in(ACTIVE_STATUSES))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(order, items)| OrderResponse::from_models(order, items))
            .collect())
    }

    pub async fn get_orders_by_table(
        &self,
        table_id: Uuid,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::TableId.eq(table_id))
            .filter(order::Column::Status.is_in(ACTIVE_STATUSES))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(order, items)| OrderResponse::from_models(order, items))
            .collect())
    }

    async fn load_editable<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} is already {}",
                order_id,
                order.status.to_value()
            )));
        }
        Ok(order)
    }

    async fn load_item<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<order_item::Model, ServiceError> {
        order_item::Entity::find_by_id(item_id)
            .filter(order_item::Column::OrderId.eq(order_id))
            .one(conn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Line item {} not found on order {}",
                    item_id, order_id
                ))
            })
    }

    async fn items_of<C: ConnectionTrait>(
        &self,
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(conn)
            .await?)
    }

    async fn load_with_items(
        &self,
        order_id: Uuid,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        let items = self.items_of(&*self.db, order_id).await?;
        Ok((order, items))
    }

    /// Recomputes `subtotal` from the non-cancelled lines and restores
    /// the `final_total = max(subtotal - discount, 0)` invariant, with
    /// the discount re-clamped to the new subtotal.
    async fn recompute_totals<C: ConnectionTrait>(
        &self,
        conn: &C,
        order: order::Model,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let items = self.items_of(conn, order.id).await?;

        let subtotal: Decimal = items
            .iter()
            .filter(|item| item.status != OrderItemStatus::Cancelled)
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();

        let discount = clamp_discount(subtotal, order.discount_amount);
        let version = order.version;

        let mut active: OrderActiveModel = order.into();
        active.subtotal = Set(subtotal);
        active.discount_amount = Set(discount);
        active.final_total = Set(final_total(subtotal, discount));
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);
        let updated = active.update(conn).await?;

        Ok((updated, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_transitions_follow_the_graph() {
        use OrderStatus::*;

        assert!(order_transition_allowed(Pending, InProgress));
        assert!(order_transition_allowed(InProgress, Completed));
        assert!(order_transition_allowed(Pending, Cancelled));
        assert!(order_transition_allowed(InProgress, Cancelled));
        assert!(order_transition_allowed(Pending, Pending));

        // No transition leaves a terminal state.
        assert!(!order_transition_allowed(Completed, Pending));
        assert!(!order_transition_allowed(Completed, Cancelled));
        assert!(!order_transition_allowed(Cancelled, Pending));
        assert!(!order_transition_allowed(Cancelled, InProgress));
        // No skipping forward.
        assert!(!order_transition_allowed(Pending, Completed));
    }

    #[test]
    fn item_transitions_follow_the_kitchen_flow() {
        use OrderItemStatus::*;

        assert!(item_transition_allowed(Pending, Preparing));
        assert!(item_transition_allowed(Preparing, Ready));
        assert!(item_transition_allowed(Pending, Cancelled));
        assert!(item_transition_allowed(Preparing, Cancelled));

        assert!(!item_transition_allowed(Ready, Cancelled));
        assert!(!item_transition_allowed(Ready, Pending));
        assert!(!item_transition_allowed(Cancelled, Preparing));
        assert!(!item_transition_allowed(Pending, Ready));
    }
}
