use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    services::orders::OrderResponse,
    services::promotions::{CreatePromotionRequest, PromotionResponse, UpdatePromotionRequest},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplyPromotionRequest {
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/promotions",
    summary = "Create promotion",
    request_body = CreatePromotionRequest,
    responses(
        (status = 201, description = "Promotion created", body = ApiResponse<PromotionResponse>),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_promotion(
    State(state): State<AppState>,
    Json(request): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PromotionResponse>>), ServiceError> {
    let promotion = state.services.promotions.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(promotion))))
}

#[utoipa::path(
    get,
    path = "/api/v1/promotions",
    summary = "List promotions",
    responses((status = 200, description = "All promotions", body = ApiResponse<Vec<PromotionResponse>>))
)]
pub async fn list_promotions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PromotionResponse>>>, ServiceError> {
    let promotions = state.services.promotions.list().await?;
    Ok(Json(ApiResponse::success(promotions)))
}

#[utoipa::path(
    get,
    path = "/api/v1/promotions/valid",
    summary = "List currently valid promotions",
    description = "Valid promotions sorted by end date, soonest-expiring first",
    responses((status = 200, description = "Valid promotions", body = ApiResponse<Vec<PromotionResponse>>))
)]
pub async fn list_valid_promotions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<PromotionResponse>>>, ServiceError> {
    let promotions = state.services.promotions.list_valid().await?;
    Ok(Json(ApiResponse::success(promotions)))
}

#[utoipa::path(
    get,
    path = "/api/v1/promotions/{id}",
    summary = "Get promotion",
    params(("id" = Uuid, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Promotion", body = ApiResponse<PromotionResponse>),
        (status = 404, description = "Promotion not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PromotionResponse>>, ServiceError> {
    let promotion = state.services.promotions.get(id).await?;
    Ok(Json(ApiResponse::success(promotion)))
}

#[utoipa::path(
    put,
    path = "/api/v1/promotions/{id}",
    summary = "Update promotion",
    request_body = UpdatePromotionRequest,
    params(("id" = Uuid, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Promotion updated", body = ApiResponse<PromotionResponse>),
        (status = 404, description = "Promotion not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePromotionRequest>,
) -> Result<Json<ApiResponse<PromotionResponse>>, ServiceError> {
    let promotion = state.services.promotions.update(id, request).await?;
    Ok(Json(ApiResponse::success(promotion)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/promotions/{id}",
    summary = "Delete promotion",
    params(("id" = Uuid, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Promotion deleted", body = ApiResponse<String>),
        (status = 404, description = "Promotion not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.promotions.delete(id).await?;
    Ok(Json(ApiResponse::success("deleted".to_string())))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/promotions",
    summary = "Apply a promotion code to an order",
    request_body = ApplyPromotionRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with the discount applied", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Promotion invalid, depleted or without effect", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or promotion not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order can no longer be discounted", body = crate::errors::ErrorResponse),
    )
)]
pub async fn apply_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyPromotionRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.promotions.apply(id, &request.code).await?;
    Ok(Json(ApiResponse::success(order)))
}
