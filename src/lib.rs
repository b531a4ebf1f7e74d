//! Order ingestion and inventory reconciliation for a third-party logistics
//! warehouse.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod integrations;
pub mod middleware_helpers;
pub mod migrator;
pub mod notifications;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use integrations::shipstation::ShippingPlatform;
use notifications::Notifier;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use services::{
    brand_directory::BrandDirectory, fees::FeeSchedule, inbound_receipts::InboundReceiptService,
    manual_orders::ManualOrderService, order_ingestor::OrderIngestor,
    order_materializer::OrderMaterializer, tracking::TrackingService,
};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<config::AppConfig>,
    pub directory: Arc<BrandDirectory>,
    pub ingestor: Arc<OrderIngestor>,
    pub manual_orders: Arc<ManualOrderService>,
    pub inbound: Arc<InboundReceiptService>,
    pub tracking: Arc<TrackingService>,
}

impl AppState {
    /// Wires every service from configuration and the two outbound collaborators.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        shipping: Arc<dyn ShippingPlatform>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let directory = Arc::new(BrandDirectory::from_config(&config.ingestion));
        let fees = Arc::new(FeeSchedule::from_config(&config.ingestion));
        let materializer = Arc::new(OrderMaterializer::new(db.clone(), fees));
        let warehouse = config.shipping.warehouse_location.clone();

        let ingestor = Arc::new(OrderIngestor::new(
            shipping.clone(),
            directory.clone(),
            materializer.clone(),
            notifier.clone(),
            config.notifications.clone(),
            warehouse.clone(),
        ));
        let manual_orders = Arc::new(ManualOrderService::new(
            db.clone(),
            materializer,
            directory.clone(),
            notifier.clone(),
            config.notifications.ops_email.clone(),
            warehouse,
        ));
        let inbound = Arc::new(InboundReceiptService::new(db.clone()));
        let tracking = Arc::new(TrackingService::new(
            db.clone(),
            shipping,
            directory.clone(),
            notifier,
        ));

        Self {
            db,
            config: Arc::new(config),
            directory,
            ingestor,
            manual_orders,
            inbound,
            tracking,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/shipstation/orders",
            post(handlers::webhooks::shipstation_orders),
        )
        .route(
            "/shipstation/shipments",
            post(handlers::webhooks::shipstation_shipments),
        )
        .route(
            "/shipstation/fulfillments",
            post(handlers::webhooks::shipstation_fulfillments),
        )
        .route("/shopify/:shop/orders", post(handlers::webhooks::shopify_order))
}

pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(handlers::health::status))
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/:order_number", get(handlers::orders::get_order))
        .route(
            "/inbound-shipments",
            post(handlers::inbound_shipments::create_inbound_shipment),
        )
        .route(
            "/inbound-shipments/:id",
            get(handlers::inbound_shipments::get_inbound_shipment),
        )
        .route(
            "/inbound-shipments/line-items/:id/count",
            put(handlers::inbound_shipments::submit_count),
        )
}

/// Full application router with request ids and HTTP tracing. Transport
/// concerns (CORS, compression, timeouts) are layered on in `main`.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/webhooks", webhook_routes())
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .merge(openapi::swagger_ui())
        .layer(crate::tracing::configure_http_tracing())
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
}
