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
    services::reservations::{CheckInResponse, CreateReservationRequest, ReservationResponse},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckInRequest {
    pub table_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    summary = "Create reservation",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created", body = ApiResponse<ReservationResponse>),
        (status = 400, description = "Time outside operating hours, in the past or too far ahead", body = crate::errors::ErrorResponse),
        (status = 409, description = "Requested table is not available", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationResponse>>), ServiceError> {
    let reservation = state
        .services
        .reservations
        .create_reservation(request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(reservation))))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    summary = "List reservations",
    responses((status = 200, description = "All reservations", body = ApiResponse<Vec<ReservationResponse>>))
)]
pub async fn list_reservations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ReservationResponse>>>, ServiceError> {
    let reservations = state.services.reservations.list_reservations().await?;
    Ok(Json(ApiResponse::success(reservations)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    summary = "Get reservation",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationResponse>),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReservationResponse>>, ServiceError> {
    let reservation = state.services.reservations.get_reservation(id).await?;
    Ok(Json(ApiResponse::success(reservation)))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/confirm",
    summary = "Confirm reservation",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation confirmed", body = ApiResponse<ReservationResponse>),
        (status = 409, description = "Reservation is not pending", body = crate::errors::ErrorResponse),
    )
)]
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReservationResponse>>, ServiceError> {
    let reservation = state.services.reservations.confirm_reservation(id).await?;
    Ok(Json(ApiResponse::success(reservation)))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/cancel",
    summary = "Cancel reservation",
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationResponse>),
        (status = 409, description = "Reservation already checked in or cancelled", body = crate::errors::ErrorResponse),
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ReservationResponse>>, ServiceError> {
    let reservation = state.services.reservations.cancel_reservation(id).await?;
    Ok(Json(ApiResponse::success(reservation)))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/check-in",
    summary = "Check a reservation in",
    description = "Seats the party: occupies the table and opens a dine-in order bound to it",
    request_body = CheckInRequest,
    params(("id" = Uuid, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation, order and table", body = ApiResponse<CheckInResponse>),
        (status = 409, description = "Reservation not seatable or table taken", body = crate::errors::ErrorResponse),
    )
)]
pub async fn check_in(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<ApiResponse<CheckInResponse>>, ServiceError> {
    let result = state
        .services
        .reservations
        .check_in(id, request.table_id)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}
