use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    entities::{category, combo, combo_item, dish},
    errors::ServiceError,
    services::catalog::{
        CreateCategoryRequest, CreateComboRequest, CreateDishRequest, UpdateDishRequest,
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct DishListQuery {
    pub category_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create category",
    request_body = CreateCategoryRequest,
    responses((status = 201, description = "Category created"))
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<category::Model>>), ServiceError> {
    let category = state.services.catalog.create_category(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    responses((status = 200, description = "All categories"))
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<category::Model>>>, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    post,
    path = "/api/v1/dishes",
    summary = "Create dish",
    request_body = CreateDishRequest,
    responses((status = 201, description = "Dish created"))
)]
pub async fn create_dish(
    State(state): State<AppState>,
    Json(request): Json<CreateDishRequest>,
) -> Result<(StatusCode, Json<ApiResponse<dish::Model>>), ServiceError> {
    let dish = state.services.catalog.create_dish(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(dish))))
}

#[utoipa::path(
    get,
    path = "/api/v1/dishes",
    summary = "List dishes",
    params(DishListQuery),
    responses((status = 200, description = "Dishes, optionally filtered by category"))
)]
pub async fn list_dishes(
    State(state): State<AppState>,
    Query(query): Query<DishListQuery>,
) -> Result<Json<ApiResponse<Vec<dish::Model>>>, ServiceError> {
    let dishes = state.services.catalog.list_dishes(query.category_id).await?;
    Ok(Json(ApiResponse::success(dishes)))
}

#[utoipa::path(
    get,
    path = "/api/v1/dishes/{id}",
    summary = "Get dish",
    params(("id" = Uuid, Path, description = "Dish id")),
    responses(
        (status = 200, description = "Dish"),
        (status = 404, description = "Dish not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_dish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<dish::Model>>, ServiceError> {
    let dish = state.services.catalog.get_dish(id).await?;
    Ok(Json(ApiResponse::success(dish)))
}

#[utoipa::path(
    put,
    path = "/api/v1/dishes/{id}",
    summary = "Update dish",
    request_body = UpdateDishRequest,
    params(("id" = Uuid, Path, description = "Dish id")),
    responses(
        (status = 200, description = "Dish updated"),
        (status = 404, description = "Dish not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_dish(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDishRequest>,
) -> Result<Json<ApiResponse<dish::Model>>, ServiceError> {
    let dish = state.services.catalog.update_dish(id, request).await?;
    Ok(Json(ApiResponse::success(dish)))
}

#[utoipa::path(
    post,
    path = "/api/v1/combos",
    summary = "Create combo",
    request_body = CreateComboRequest,
    responses((status = 201, description = "Combo created"))
)]
pub async fn create_combo(
    State(state): State<AppState>,
    Json(request): Json<CreateComboRequest>,
) -> Result<(StatusCode, Json<ApiResponse<combo::Model>>), ServiceError> {
    let combo = state.services.catalog.create_combo(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(combo))))
}

#[utoipa::path(
    get,
    path = "/api/v1/combos",
    summary = "List combos",
    responses((status = 200, description = "All combos"))
)]
pub async fn list_combos(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<combo::Model>>>, ServiceError> {
    let combos = state.services.catalog.list_combos().await?;
    Ok(Json(ApiResponse::success(combos)))
}

#[utoipa::path(
    get,
    path = "/api/v1/combos/{id}/items",
    summary = "List a combo's component dishes",
    params(("id" = Uuid, Path, description = "Combo id")),
    responses(
        (status = 200, description = "Combo components"),
        (status = 404, description = "Combo not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_combo_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<combo_item::Model>>>, ServiceError> {
    state.services.catalog.get_combo(id).await?;
    let items = state.services.catalog.combo_items(id).await?;
    Ok(Json(ApiResponse::success(items)))
}
