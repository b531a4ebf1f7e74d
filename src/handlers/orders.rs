use crate::errors::ServiceError;
use crate::handlers::common::{created_response, success_response, validate_input};
use crate::services::manual_orders::{CreatePortalOrderRequest, OrderWithLines};
use crate::AppState;
use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};

/// Create an order from the client portal
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create portal order",
    description = "Creates the order, deducts stock and queues it for the shipping platform. Rejected when any line exceeds on-hand stock.",
    request_body = CreatePortalOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::ApiResponse<OrderWithLines>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order number already used", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreatePortalOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let created = state.manual_orders.create_order(payload).await?;
    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_number}",
    summary = "Get order by number",
    params(("order_number" = String, Path, description = "Order number")),
    responses(
        (status = 200, description = "Order retrieved", body = crate::ApiResponse<OrderWithLines>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Response, ServiceError> {
    let order = state.manual_orders.get_order(&order_number).await?;
    Ok(success_response(order))
}
