//! Inbound webhooks from the shipping platform and storefronts. Webhook
//! callers get the batch report with 200 even when individual orders failed.

use crate::errors::ServiceError;
use crate::integrations::shopify::HMAC_HEADER;
use crate::services::order_ingestor::IngestReport;
use crate::services::tracking::{TrackingReport, TrackingSource};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

/// Shipping platform webhook envelope
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ResourceNotification {
    #[serde(default)]
    pub resource_url: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
}

impl ResourceNotification {
    fn resource_url(&self) -> Result<&str, ServiceError> {
        self.resource_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::BadRequest(
                    "Invalid webhook payload: no resource_url provided".to_string(),
                )
            })
    }
}

#[utoipa::path(
    post,
    path = "/webhooks/shipstation/orders",
    request_body = ResourceNotification,
    responses(
        (status = 200, description = "Batch processed", body = IngestReport),
        (status = 400, description = "Missing resource_url", body = crate::errors::ErrorResponse),
        (status = 502, description = "Shipping platform unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn shipstation_orders(
    State(state): State<AppState>,
    Json(notification): Json<ResourceNotification>,
) -> Result<Json<IngestReport>, ServiceError> {
    let resource_url = notification.resource_url()?;
    info!(resource_type = ?notification.resource_type, "order notification received");
    let report = state.ingestor.ingest_resource(resource_url).await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/webhooks/shipstation/shipments",
    request_body = ResourceNotification,
    responses(
        (status = 200, description = "Shipments applied", body = TrackingReport),
        (status = 400, description = "Missing resource_url", body = crate::errors::ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn shipstation_shipments(
    State(state): State<AppState>,
    Json(notification): Json<ResourceNotification>,
) -> Result<Json<TrackingReport>, ServiceError> {
    let resource_url = notification.resource_url()?;
    let report = state
        .tracking
        .process_resource(TrackingSource::Shipments, resource_url)
        .await?;
    Ok(Json(report))
}

#[utoipa::path(
    post,
    path = "/webhooks/shipstation/fulfillments",
    request_body = ResourceNotification,
    responses(
        (status = 200, description = "Fulfillments applied", body = TrackingReport),
        (status = 400, description = "Missing resource_url", body = crate::errors::ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn shipstation_fulfillments(
    State(state): State<AppState>,
    Json(notification): Json<ResourceNotification>,
) -> Result<Json<TrackingReport>, ServiceError> {
    let resource_url = notification.resource_url()?;
    let report = state
        .tracking
        .process_resource(TrackingSource::Fulfillments, resource_url)
        .await?;
    Ok(Json(report))
}

/// Raw body is needed for HMAC verification, so the payload is parsed after.
#[utoipa::path(
    post,
    path = "/webhooks/shopify/{shop}/orders",
    params(("shop" = String, Path, description = "Shop key from the ingestion config")),
    request_body(content = String, description = "Storefront order JSON, signed with X-Shopify-Hmac-Sha256", content_type = "application/json"),
    responses(
        (status = 200, description = "Order processed", body = IngestReport),
        (status = 401, description = "Signature mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown shop", body = crate::errors::ErrorResponse)
    ),
    tag = "webhooks"
)]
pub async fn shopify_order(
    State(state): State<AppState>,
    Path(shop): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<IngestReport>, ServiceError> {
    let signature = headers.get(HMAC_HEADER).and_then(|v| v.to_str().ok());
    // Single-order deliveries surface failures so the storefront redelivers
    let (order_number, outcome) = state
        .ingestor
        .ingest_storefront_order(&shop, &body, signature)
        .await?;
    let mut report = IngestReport::default();
    report.record(&order_number, Ok(outcome));
    Ok(Json(report))
}
