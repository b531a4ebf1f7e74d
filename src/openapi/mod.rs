use crate::handlers::{health, inbound_shipments, orders, webhooks};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "3PL Order & Inventory API",
        version = "0.1.0",
        description = r#"
Order ingestion and inventory reconciliation for a third-party logistics warehouse.

- **Webhooks** receive orders and shipment notifications from the shipping platform and storefronts.
- **Orders** entered through the client portal are checked against on-hand stock.
- **Inbound shipments** move counted stock from pending to on-hand.

Errors share one body: `{error, message, request_id?, timestamp}`.
"#
    ),
    paths(
        health::health,
        health::status,
        webhooks::shipstation_orders,
        webhooks::shipstation_shipments,
        webhooks::shipstation_fulfillments,
        webhooks::shopify_order,
        orders::create_order,
        orders::get_order,
        inbound_shipments::create_inbound_shipment,
        inbound_shipments::get_inbound_shipment,
        inbound_shipments::submit_count,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::order_ingestor::IngestReport,
        crate::services::order_ingestor::FailedOrder,
        crate::services::order_ingestor::IngestOutcome,
        crate::services::tracking::TrackingReport,
        crate::services::manual_orders::CreatePortalOrderRequest,
        crate::services::manual_orders::PortalOrderLine,
        crate::services::inbound_receipts::CreateInboundShipmentRequest,
        crate::services::inbound_receipts::InboundLineRequest,
        crate::services::inbound_receipts::SubmitCountRequest,
        webhooks::ResourceNotification,
    )),
    tags(
        (name = "health", description = "Liveness and status"),
        (name = "webhooks", description = "Shipping platform and storefront callbacks"),
        (name = "orders", description = "Client portal orders"),
        (name = "inbound", description = "Inbound shipments and receipt counts"),
    )
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}
