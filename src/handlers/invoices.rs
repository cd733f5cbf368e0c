use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::payment_method,
    errors::ServiceError,
    services::invoicing::{
        ApplyDiscountRequest, CompletePaymentRequest, CreatePaymentMethodRequest, InvoiceResponse,
        PaymentRequest, SettlementResponse,
    },
    services::orders::OrderResponse,
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GenerateInvoiceRequest {
    pub staff_id: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/invoice",
    summary = "Generate (or fetch) the invoice for an order",
    request_body = GenerateInvoiceRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Invoice", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn generate_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state
        .services
        .invoicing
        .generate_invoice(id, request.staff_id)
        .await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/discount",
    summary = "Apply a manual discount",
    request_body = ApplyDiscountRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with the discount", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order already has a discount", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order terminal or invoice already paid", body = crate::errors::ErrorResponse),
    )
)]
pub async fn apply_discount(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ApplyDiscountRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.invoicing.apply_discount(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/payments",
    summary = "Record a payment",
    request_body = PaymentRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Invoice with its payments", body = ApiResponse<InvoiceResponse>),
        (status = 400, description = "Amount invalid or beyond outstanding balance", body = crate::errors::ErrorResponse),
        (status = 404, description = "No invoice exists for the order", body = crate::errors::ErrorResponse),
    )
)]
pub async fn process_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state.services.invoicing.process_payment(id, request).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/complete-payment",
    summary = "Settle an order",
    description = "Get-or-create the invoice, pay the outstanding balance in full, complete the order and release its table",
    request_body = CompletePaymentRequest,
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Settlement result", body = ApiResponse<SettlementResponse>),
        (status = 409, description = "Order cancelled or already settled", body = crate::errors::ErrorResponse),
    )
)]
pub async fn process_complete_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CompletePaymentRequest>,
) -> Result<Json<ApiResponse<SettlementResponse>>, ServiceError> {
    let settlement = state
        .services
        .invoicing
        .process_complete_payment(id, request)
        .await?;
    Ok(Json(ApiResponse::success(settlement)))
}

#[utoipa::path(
    post,
    path = "/api/v1/payment-methods",
    summary = "Create payment method",
    request_body = CreatePaymentMethodRequest,
    responses((status = 201, description = "Payment method created"))
)]
pub async fn create_payment_method(
    State(state): State<AppState>,
    Json(request): Json<CreatePaymentMethodRequest>,
) -> Result<(StatusCode, Json<ApiResponse<payment_method::Model>>), ServiceError> {
    let method = state.services.invoicing.create_payment_method(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(method))))
}

#[utoipa::path(
    get,
    path = "/api/v1/payment-methods",
    summary = "List active payment methods",
    responses((status = 200, description = "Active payment methods"))
)]
pub async fn list_payment_methods(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<payment_method::Model>>>, ServiceError> {
    let methods = state.services.invoicing.list_payment_methods().await?;
    Ok(Json(ApiResponse::success(methods)))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    summary = "Get invoice",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice", body = ApiResponse<InvoiceResponse>),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ServiceError> {
    let invoice = state.services.invoicing.get_invoice(id).await?;
    Ok(Json(ApiResponse::success(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}/receipt",
    summary = "Export the receipt for an invoice",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Receipt bytes", content_type = "text/plain"),
        (status = 404, description = "Invoice not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn export_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let bytes = state.services.invoicing.export_invoice_receipt(id).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        bytes,
    )
        .into_response())
}
