//! Intake for externally sourced orders: shipping-platform batches and
//! storefront webhooks. Each order is classified and materialized on its own;
//! one bad order never stops the batch.

use crate::config::{NotificationConfig, StoreRoute};
use crate::entities::order::FulfillmentChannel;
use crate::errors::ServiceError;
use crate::integrations::shipstation::{
    parse_timestamp, CreateOrderRequest, Order as PlatformOrder, ShippingPlatform, Store,
};
use crate::integrations::shopify::{self, ShopifyOrder};
use crate::notifications::{self, Notifier, UnmappedSkuAlert};
use crate::services::brand_directory::BrandDirectory;
use crate::services::inventory_adjuster::DeductionPolicy;
use crate::services::order_materializer::{
    DraftLine, LineTarget, MaterializeOutcome, MaterializedOrder, OrderDraft, OrderMaterializer,
    Recipient,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created {
        order_id: Uuid,
        order_number: String,
        unmapped_skus: usize,
    },
    Duplicate,
    /// Store is configured to be handled elsewhere
    Excluded,
    /// Store is not in the directory
    Unclassified,
}

impl IngestOutcome {
    fn label(&self) -> &'static str {
        match self {
            IngestOutcome::Created { .. } => "created",
            IngestOutcome::Duplicate => "duplicate",
            IngestOutcome::Excluded => "excluded",
            IngestOutcome::Unclassified => "unclassified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FailedOrder {
    pub order_number: String,
    pub error: String,
}

/// Per-batch summary returned to the webhook caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct IngestReport {
    pub received: usize,
    pub created: usize,
    pub duplicates: usize,
    pub excluded: usize,
    pub unclassified: usize,
    pub failed: Vec<FailedOrder>,
}

impl IngestReport {
    pub fn record(&mut self, order_number: &str, result: Result<IngestOutcome, ServiceError>) {
        self.received += 1;
        let label = match &result {
            Ok(outcome) => outcome.label(),
            Err(_) => "failed",
        };
        counter!("threepl_orders_ingested_total", 1, "outcome" => label);

        match result {
            Ok(IngestOutcome::Created { .. }) => self.created += 1,
            Ok(IngestOutcome::Duplicate) => self.duplicates += 1,
            Ok(IngestOutcome::Excluded) => self.excluded += 1,
            Ok(IngestOutcome::Unclassified) => self.unclassified += 1,
            Err(e) => {
                error!(order_number, error = %e, "order ingestion failed");
                self.failed.push(FailedOrder {
                    order_number: order_number.to_string(),
                    error: e.response_message(),
                });
            }
        }
    }
}

pub struct OrderIngestor {
    shipping: Arc<dyn ShippingPlatform>,
    directory: Arc<BrandDirectory>,
    materializer: Arc<OrderMaterializer>,
    notifier: Arc<dyn Notifier>,
    notifications: NotificationConfig,
    warehouse_location: String,
}

fn recipient_of(order: &PlatformOrder) -> Recipient {
    let ship_to = &order.ship_to;
    Recipient {
        customer_email: order.customer_email.clone(),
        customer_name: ship_to.name.clone(),
        company: ship_to.company.clone(),
        street1: ship_to.street1.clone(),
        street2: ship_to.street2.clone(),
        city: ship_to.city.clone(),
        state: ship_to.state.clone(),
        postal_code: ship_to.postal_code.clone(),
        country: ship_to.country.clone(),
        phone: ship_to.phone.clone(),
    }
}

fn lines_of(order: &PlatformOrder) -> Vec<DraftLine> {
    order
        .items
        .iter()
        .map(|item| DraftLine {
            target: LineTarget::Sku(item.sku.clone()),
            name: item.name.clone(),
            image_url: item.image_url.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price.unwrap_or_default(),
        })
        .collect()
}

/// Common header fields; callers fill in brand, source and attribution.
fn base_draft(order: &PlatformOrder, change_source: String) -> OrderDraft {
    OrderDraft {
        order_number: order.order_number.clone(),
        order_date: order.order_date.as_deref().and_then(parse_timestamp),
        is_3pl_order: true,
        brand_id: None,
        brand_name: None,
        order_source: order.advanced_options.source.clone(),
        recipient: recipient_of(order),
        carrier: None,
        tracking_number: None,
        fulfillment_channel: FulfillmentChannel::from_externally_fulfilled(
            order.externally_fulfilled,
        ),
        shipping_amount: order.shipping_amount,
        amount_paid: order.amount_paid,
        notes: order.customer_notes.clone(),
        lines: lines_of(order),
        channel: Some(change_source.clone()),
        change_source,
        policy: DeductionPolicy::Clamp,
        price_from_asin: false,
        mirror: None,
    }
}

/// Name of the store an order came from, via the platform's store directory.
pub fn store_name_for<'a>(order: &PlatformOrder, stores: &'a [Store]) -> Option<&'a str> {
    let store_id = order.advanced_options.store_id?;
    stores
        .iter()
        .find(|store| store.store_id == store_id)
        .map(|store| store.store_name.as_str())
}

impl OrderIngestor {
    pub fn new(
        shipping: Arc<dyn ShippingPlatform>,
        directory: Arc<BrandDirectory>,
        materializer: Arc<OrderMaterializer>,
        notifier: Arc<dyn Notifier>,
        notifications: NotificationConfig,
        warehouse_location: String,
    ) -> Self {
        Self {
            shipping,
            directory,
            materializer,
            notifier,
            notifications,
            warehouse_location,
        }
    }

    /// Fetches the orders behind an ORDER_NOTIFY resource and ingests them.
    #[instrument(skip(self))]
    pub async fn ingest_resource(&self, resource_url: &str) -> Result<IngestReport, ServiceError> {
        let orders = self.shipping.fetch_orders(resource_url).await?;
        let stores = self.shipping.list_stores().await?;
        info!(orders = orders.len(), "fetched orders from shipping platform");
        Ok(self.ingest_batch(&orders, &stores).await)
    }

    pub async fn ingest_batch(&self, orders: &[PlatformOrder], stores: &[Store]) -> IngestReport {
        let mut report = IngestReport::default();
        for order in orders {
            let store_name = store_name_for(order, stores);
            let result = self.ingest_platform_order(order, store_name).await;
            report.record(&order.order_number, result);
        }
        report
    }

    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn ingest_platform_order(
        &self,
        order: &PlatformOrder,
        store_name: Option<&str>,
    ) -> Result<IngestOutcome, ServiceError> {
        let Some(store_name) = store_name else {
            warn!(store_id = ?order.advanced_options.store_id, "order from unknown store id");
            return Ok(IngestOutcome::Unclassified);
        };

        let draft = match self.directory.classify(store_name) {
            None => {
                warn!(store_name, "store missing from brand directory");
                return Ok(IngestOutcome::Unclassified);
            }
            Some(StoreRoute::Excluded) => {
                info!(store_name, "store excluded from ingestion");
                return Ok(IngestOutcome::Excluded);
            }
            Some(StoreRoute::Brand(brand)) => OrderDraft {
                brand_id: Some(brand.brand_id.clone()),
                brand_name: brand.brand_name.clone(),
                ..base_draft(order, store_name.to_string())
            },
            Some(StoreRoute::Marketplace { order_source }) => OrderDraft {
                is_3pl_order: false,
                order_source: Some(order_source.clone()),
                price_from_asin: true,
                channel: Some(store_name.to_string()),
                ..base_draft(order, order_source.clone())
            },
        };

        self.materialize(draft).await
    }

    /// Verifies and ingests a storefront order webhook for `shop_key`, then
    /// queues it for creation on the shipping platform.
    #[instrument(skip(self, body, signature))]
    pub async fn ingest_storefront_order(
        &self,
        shop_key: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<(String, IngestOutcome), ServiceError> {
        let shop = self
            .directory
            .shop(shop_key)
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown shop {}", shop_key)))?;

        if let Some(secret) = shop.webhook_secret.as_deref().filter(|s| !s.is_empty()) {
            shopify::verify_webhook(secret, body, signature)?;
        }

        let storefront_order: ShopifyOrder = serde_json::from_slice(body)
            .map_err(|e| ServiceError::BadRequest(format!("Invalid order payload: {}", e)))?;
        let order = storefront_order.to_platform_order(&shop.order_source);

        let brand_label = shop
            .brand
            .brand_name
            .clone()
            .unwrap_or_else(|| shop.brand.brand_id.clone());
        let draft = OrderDraft {
            brand_id: Some(shop.brand.brand_id.clone()),
            brand_name: shop.brand.brand_name.clone(),
            mirror: Some(CreateOrderRequest::from_order(
                &order,
                &self.warehouse_location,
            )),
            ..base_draft(&order, format!("{} Shopify", brand_label))
        };

        let outcome = self.materialize(draft).await?;
        Ok((order.order_number, outcome))
    }

    async fn materialize(&self, draft: OrderDraft) -> Result<IngestOutcome, ServiceError> {
        match self.materializer.materialize(draft).await? {
            MaterializeOutcome::Duplicate => Ok(IngestOutcome::Duplicate),
            MaterializeOutcome::Created(created) => {
                self.alert_unmapped(&created).await;
                Ok(IngestOutcome::Created {
                    order_id: created.order.id,
                    order_number: created.order.order_number.clone(),
                    unmapped_skus: created.unmapped.len(),
                })
            }
        }
    }

    async fn alert_unmapped(&self, created: &MaterializedOrder) {
        if !self.notifications.alert_on_unmapped_sku || created.unmapped.is_empty() {
            return;
        }
        let skus: Vec<UnmappedSkuAlert> = created
            .unmapped
            .iter()
            .map(|row| UnmappedSkuAlert {
                sku: row.sku.clone(),
                product_name: row.product_name.clone(),
                quantity: row.quantity,
            })
            .collect();
        let message = notifications::unmapped_sku_message(
            self.notifications.ops_email.as_deref(),
            &created.order.order_number,
            created.order.brand_name.as_deref(),
            &skus,
        );
        notifications::notify_best_effort(self.notifier.as_ref(), message).await;
    }
}
