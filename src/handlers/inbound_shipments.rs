use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::services::inbound_receipts::{
    CountResult, CreateInboundShipmentRequest, ShipmentWithLines, SubmitCountRequest,
};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use uuid::Uuid;

#[utoipa::path(
    post,
    path = "/api/v1/inbound-shipments",
    summary = "Create inbound shipment",
    description = "Records expected stock and adds it to each product's pending quantity.",
    request_body = CreateInboundShipmentRequest,
    responses(
        (status = 201, description = "Shipment created", body = crate::ApiResponse<ShipmentWithLines>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "inbound"
)]
pub async fn create_inbound_shipment(
    State(state): State<AppState>,
    Json(payload): Json<CreateInboundShipmentRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let created = state.inbound.create_shipment(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/inbound-shipments/{id}",
    params(("id" = Uuid, Path, description = "Inbound shipment id")),
    responses(
        (status = 200, description = "Shipment retrieved", body = crate::ApiResponse<ShipmentWithLines>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inbound"
)]
pub async fn get_inbound_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let shipment = state.inbound.get_shipment(id).await?;
    Ok(success_response(shipment))
}

/// Submit the physical count for one line
#[utoipa::path(
    put,
    path = "/api/v1/inbound-shipments/line-items/{id}/count",
    params(("id" = Uuid, Path, description = "Inbound shipment line item id")),
    request_body = SubmitCountRequest,
    responses(
        (status = 200, description = "Count applied", body = crate::ApiResponse<CountResult>),
        (status = 400, description = "Negative count", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Stock changed concurrently", body = crate::errors::ErrorResponse)
    ),
    tag = "inbound"
)]
pub async fn submit_count(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitCountRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let result = state
        .inbound
        .submit_count(id, payload.counted_quantity)
        .await?;
    Ok(success_response(result))
}
