use axum::{extract::State, http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    errors::ServiceError,
    services::auth::{CreateStaffRequest, LoginRequest, LoginResponse, StaffResponse},
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueCodeRequest {
    pub session_key: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueCodeResponse {
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyCodeRequest {
    pub session_key: String,
    pub code: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    summary = "Staff login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ServiceError> {
    let response = state.services.auth.login(request).await?;
    Ok(Json(ApiResponse::success(response)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/staff",
    summary = "Create staff account",
    request_body = CreateStaffRequest,
    responses(
        (status = 201, description = "Staff created", body = ApiResponse<StaffResponse>),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_staff(
    State(state): State<AppState>,
    Json(request): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StaffResponse>>), ServiceError> {
    let staff = state.services.auth.create_staff(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(staff))))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/codes",
    summary = "Issue a one-time code for a QR session",
    request_body = IssueCodeRequest,
    responses((status = 200, description = "Code issued", body = ApiResponse<IssueCodeResponse>))
)]
pub async fn issue_code(
    State(state): State<AppState>,
    Json(request): Json<IssueCodeRequest>,
) -> Result<Json<ApiResponse<IssueCodeResponse>>, ServiceError> {
    let code = state.services.auth.issue_code(&request.session_key);
    Ok(Json(ApiResponse::success(IssueCodeResponse { code })))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/codes/verify",
    summary = "Verify and consume a one-time code",
    request_body = VerifyCodeRequest,
    responses(
        (status = 200, description = "Code accepted"),
        (status = 401, description = "Code unknown, wrong or expired", body = crate::errors::ErrorResponse),
    )
)]
pub async fn verify_code(
    State(state): State<AppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    if state
        .services
        .auth
        .verify_code(&request.session_key, &request.code)
    {
        Ok(Json(ApiResponse::success("verified".to_string())))
    } else {
        Err(ServiceError::AuthError(
            "Code unknown, wrong or expired".to_string(),
        ))
    }
}
