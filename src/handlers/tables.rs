use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{area, dining_table::TableStatus},
    errors::ServiceError,
    services::tables::{
        CreateAreaRequest, CreateTableRequest, GroupTablesRequest, TableGroupResponse,
        TableResponse,
    },
    ApiResponse, AppState,
};

pub(crate) fn map_table_status(status: &str) -> Result<TableStatus, ServiceError> {
    match status.to_ascii_lowercase().as_str() {
        "available" => Ok(TableStatus::Available),
        "reserved" => Ok(TableStatus::Reserved),
        "occupied" => Ok(TableStatus::Occupied),
        other => Err(ServiceError::ValidationError(format!(
            "Unknown table status: {other}"
        ))),
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTableStatusRequest {
    pub status: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/areas",
    summary = "Create area",
    request_body = CreateAreaRequest,
    responses((status = 201, description = "Area created"))
)]
pub async fn create_area(
    State(state): State<AppState>,
    Json(request): Json<CreateAreaRequest>,
) -> Result<(StatusCode, Json<ApiResponse<area::Model>>), ServiceError> {
    let area = state.services.tables.create_area(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(area))))
}

#[utoipa::path(
    get,
    path = "/api/v1/areas",
    summary = "List areas",
    responses((status = 200, description = "All areas"))
)]
pub async fn list_areas(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<area::Model>>>, ServiceError> {
    let areas = state.services.tables.list_areas().await?;
    Ok(Json(ApiResponse::success(areas)))
}

#[utoipa::path(
    post,
    path = "/api/v1/tables",
    summary = "Create table",
    request_body = CreateTableRequest,
    responses(
        (status = 201, description = "Table created", body = ApiResponse<TableResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_table(
    State(state): State<AppState>,
    Json(request): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TableResponse>>), ServiceError> {
    let table = state.services.tables.create_table(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(table.into())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/tables",
    summary = "List tables",
    responses((status = 200, description = "All tables", body = ApiResponse<Vec<TableResponse>>))
)]
pub async fn list_tables(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TableResponse>>>, ServiceError> {
    let tables = state.services.tables.list_tables().await?;
    Ok(Json(ApiResponse::success(
        tables.into_iter().map(TableResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/tables/available",
    summary = "List available tables",
    responses((status = 200, description = "Available tables", body = ApiResponse<Vec<TableResponse>>))
)]
pub async fn get_available_tables(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<TableResponse>>>, ServiceError> {
    let tables = state.services.tables.get_available_tables().await?;
    Ok(Json(ApiResponse::success(
        tables.into_iter().map(TableResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/tables/by-status/{status}",
    summary = "List tables by status",
    params(("status" = String, Path, description = "available | reserved | occupied")),
    responses((status = 200, description = "Tables in the given status", body = ApiResponse<Vec<TableResponse>>))
)]
pub async fn get_tables_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> Result<Json<ApiResponse<Vec<TableResponse>>>, ServiceError> {
    let status = map_table_status(&status)?;
    let tables = state.services.tables.get_tables_by_status(status).await?;
    Ok(Json(ApiResponse::success(
        tables.into_iter().map(TableResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/tables/by-area/{area_id}",
    summary = "List tables in an area",
    params(("area_id" = Uuid, Path, description = "Area id")),
    responses((status = 200, description = "Tables in the area", body = ApiResponse<Vec<TableResponse>>))
)]
pub async fn get_tables_by_area(
    State(state): State<AppState>,
    Path(area_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TableResponse>>>, ServiceError> {
    let tables = state.services.tables.get_tables_by_area(area_id).await?;
    Ok(Json(ApiResponse::success(
        tables.into_iter().map(TableResponse::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/tables/{id}",
    summary = "Get table",
    params(("id" = Uuid, Path, description = "Table id")),
    responses(
        (status = 200, description = "Table", body = ApiResponse<TableResponse>),
        (status = 404, description = "Table not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_table(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TableResponse>>, ServiceError> {
    let table = state.services.tables.get_table(id).await?;
    Ok(Json(ApiResponse::success(table.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/tables/{id}/status",
    summary = "Override table status",
    request_body = UpdateTableStatusRequest,
    params(("id" = Uuid, Path, description = "Table id")),
    responses(
        (status = 200, description = "Table updated", body = ApiResponse<TableResponse>),
        (status = 409, description = "Status changed concurrently or table busy", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_table_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTableStatusRequest>,
) -> Result<Json<ApiResponse<TableResponse>>, ServiceError> {
    let status = map_table_status(&request.status)?;
    let table = state.services.tables.update_status(id, status).await?;
    Ok(Json(ApiResponse::success(table.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/tables/merge",
    summary = "Merge tables into a group",
    request_body = GroupTablesRequest,
    responses(
        (status = 201, description = "Group created", body = ApiResponse<TableGroupResponse>),
        (status = 409, description = "A table already belongs to a group", body = crate::errors::ErrorResponse),
    )
)]
pub async fn merge_tables(
    State(state): State<AppState>,
    Json(request): Json<GroupTablesRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TableGroupResponse>>), ServiceError> {
    let group = state.services.tables.create_group(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

#[utoipa::path(
    post,
    path = "/api/v1/tables/split",
    summary = "Split seating across tables",
    request_body = GroupTablesRequest,
    responses(
        (status = 201, description = "Group created", body = ApiResponse<TableGroupResponse>),
    )
)]
pub async fn split_table(
    State(state): State<AppState>,
    Json(request): Json<GroupTablesRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TableGroupResponse>>), ServiceError> {
    let group = state.services.tables.create_group(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

#[utoipa::path(
    post,
    path = "/api/v1/tables/groups",
    summary = "Create a table group",
    request_body = GroupTablesRequest,
    responses(
        (status = 201, description = "Group created", body = ApiResponse<TableGroupResponse>),
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    Json(request): Json<GroupTablesRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TableGroupResponse>>), ServiceError> {
    let group = state.services.tables.create_group(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(group))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tables/groups/{id}",
    summary = "Disband a table group",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group disbanded", body = ApiResponse<String>),
        (status = 404, description = "Group not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn disband_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.tables.disband_group(id).await?;
    Ok(Json(ApiResponse::success("disbanded".to_string())))
}

#[utoipa::path(
    get,
    path = "/api/v1/tables/groups/{id}",
    summary = "List tables in a group",
    params(("id" = Uuid, Path, description = "Group id")),
    responses(
        (status = 200, description = "Member tables", body = ApiResponse<Vec<TableResponse>>),
        (status = 404, description = "Group not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_tables_in_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<TableResponse>>>, ServiceError> {
    let tables = state.services.tables.get_tables_in_group(id).await?;
    Ok(Json(ApiResponse::success(
        tables.into_iter().map(TableResponse::from).collect(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_status_strings_map_to_the_enum() {
        assert_eq!(
            map_table_status("available").unwrap(),
            TableStatus::Available
        );
        assert_eq!(map_table_status("Occupied").unwrap(), TableStatus::Occupied);
        assert!(map_table_status("broken").is_err());
    }
}
