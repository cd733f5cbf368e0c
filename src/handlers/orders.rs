use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{order::OrderStatus, order_item::OrderItemStatus},
    errors::ServiceError,
    services::orders::{CreateOrderRequest, OrderLineRequest, OrderResponse, UpdateLineRequest},
    ApiResponse, AppState,
};

pub(crate) fn map_order_status(status: &str) -> Result<OrderStatus, ServiceError> {
    match status.to_ascii_lowercase().as_str() {
        "pending" => Ok(OrderStatus::Pending),
        "inprogress" | "in_progress" | "preparing" => Ok(OrderStatus::InProgress),
        "completed" => Ok(OrderStatus::Completed),
        "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown order status: {other}"
        ))),
    }
}

pub(crate) fn map_item_status(status: &str) -> Result<OrderItemStatus, ServiceError> {
    match status.to_ascii_lowercase().as_str() {
        "pending" => Ok(OrderItemStatus::Pending),
        "preparing" => Ok(OrderItemStatus::Preparing),
        "ready" | "completed" => Ok(OrderItemStatus::Ready),
        "cancelled" | "canceled" => Ok(OrderItemStatus::Cancelled),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown line item status: {other}"
        ))),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Table, dish or combo not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Table is not available", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/active",
    summary = "List active orders",
    responses(
        (status = 200, description = "Active orders", body = ApiResponse<Vec<OrderResponse>>),
    )
)]
pub async fn get_active_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state.services.orders.get_active_orders().await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/by-table/{table_id}",
    summary = "List active orders for a table",
    params(("table_id" = Uuid, Path, description = "Table id")),
    responses(
        (status = 200, description = "Orders for the table", body = ApiResponse<Vec<OrderResponse>>),
    )
)]
pub async fn get_orders_by_table(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state.services.orders.get_orders_by_table(table_id).await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    request_body = UpdateStatusRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let status = map_order_status(&request.status)?;
    let order = state.services.orders.update_status(id, status).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/items",
    summary = "Add a line item",
    request_body = OrderLineRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with the new line", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order can no longer be modified", body = crate::errors::ErrorResponse),
    )
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<OrderLineRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.add_item(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/items/{item_id}",
    summary = "Update a line item",
    request_body = UpdateLineRequest,
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("item_id" = Uuid, Path, description = "Line item id"),
    ),
    responses(
        (status = 200, description = "Order with the updated line", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order can no longer be modified", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateLineRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.update_item(id, item_id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}/items/{item_id}",
    summary = "Remove a line item",
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("item_id" = Uuid, Path, description = "Line item id"),
    ),
    responses(
        (status = 200, description = "Order without the line", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order can no longer be modified", body = crate::errors::ErrorResponse),
    )
)]
pub async fn remove_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.remove_item(id, item_id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/items/{item_id}/status",
    summary = "Update a line item's kitchen status",
    request_body = UpdateStatusRequest,
    params(
        ("id" = Uuid, Path, description = "Order id"),
        ("item_id" = Uuid, Path, description = "Line item id"),
    ),
    responses(
        (status = 200, description = "Order with the updated line", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_item_status(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let status = map_item_status(&request.status)?;
    let order = state
        .services
        .orders
        .update_item_status(id, item_id, status)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}
