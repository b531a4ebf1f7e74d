//! Orders entered by brand staff through the client portal.

use crate::entities::{
    order::{self, Entity as Order, FulfillmentChannel},
    order_line_item::{self, Entity as OrderLineItem},
    product::{self, Entity as Product},
};
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::integrations::shipstation::{
    Address, AdvancedOptions, CreateOrderRequest, Order as PlatformOrder, OrderItem,
};
use crate::notifications::{self, Notifier, OrderSummaryLine};
use crate::services::brand_directory::BrandDirectory;
use crate::services::inventory_adjuster::{insufficient_stock, DeductionPolicy};
use crate::services::order_materializer::{
    DraftLine, LineTarget, MaterializeOutcome, OrderDraft, OrderMaterializer, Recipient,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const PORTAL_CHANGE_SOURCE: &str = "3PL Client Portal";
pub const PORTAL_ORDER_SOURCE: &str = "portal";

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct PortalOrderLine {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100000))]
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreatePortalOrderRequest {
    #[validate(length(min = 1, max = 64))]
    pub order_number: String,
    #[validate(length(min = 1))]
    pub brand_id: String,
    pub brand_name: Option<String>,
    #[validate(email)]
    pub customer_email: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    pub recipient_company: Option<String>,
    #[validate(length(min = 1))]
    pub street1: String,
    pub street2: Option<String>,
    #[validate(length(min = 1))]
    pub city: String,
    #[validate(length(min = 1))]
    pub state: String,
    #[validate(length(min = 1))]
    pub postal_code: String,
    #[validate(custom = "validate_country_code")]
    pub country: Option<String>,
    pub phone: Option<String>,
    pub carrier: Option<String>,
    pub notes: Option<String>,
    #[validate(length(min = 1), custom = "validate_distinct_products")]
    pub line_items: Vec<PortalOrderLine>,
}

fn country_or_default(request: &CreatePortalOrderRequest) -> String {
    request
        .country
        .as_deref()
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| "US".to_string())
}

/// Header and per-line validation.
pub fn validate_request(request: &CreatePortalOrderRequest) -> Result<(), ServiceError> {
    request.validate()?;
    for line in &request.line_items {
        line.validate()?;
    }
    Ok(())
}

fn validate_country_code(country: &str) -> Result<(), ValidationError> {
    if country.len() == 2 && country.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(ValidationError::new("country_must_be_iso_alpha2"))
    }
}

fn validate_distinct_products(lines: &[PortalOrderLine]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::new();
    if lines.iter().all(|line| seen.insert(line.product_id)) {
        Ok(())
    } else {
        Err(ValidationError::new("duplicate_product"))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderWithLines {
    #[schema(value_type = Object)]
    pub order: order::Model,
    #[schema(value_type = Vec<Object>)]
    pub line_items: Vec<order_line_item::Model>,
}

pub struct ManualOrderService {
    db: Arc<DbPool>,
    materializer: Arc<OrderMaterializer>,
    directory: Arc<BrandDirectory>,
    notifier: Arc<dyn Notifier>,
    ops_email: Option<String>,
    warehouse_location: String,
}

impl ManualOrderService {
    pub fn new(
        db: Arc<DbPool>,
        materializer: Arc<OrderMaterializer>,
        directory: Arc<BrandDirectory>,
        notifier: Arc<dyn Notifier>,
        ops_email: Option<String>,
        warehouse_location: String,
    ) -> Self {
        Self {
            db,
            materializer,
            directory,
            notifier,
            ops_email,
            warehouse_location,
        }
    }

    /// Fails fast on stock the brand does not have. The materializer checks
    /// again at deduction time, inside the transaction.
    async fn precheck_stock(
        &self,
        request: &CreatePortalOrderRequest,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut products = Vec::with_capacity(request.line_items.len());
        for line in &request.line_items {
            let product = Product::find_by_id(line.product_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;
            if product.brand_id != request.brand_id {
                return Err(ServiceError::BadRequest(format!(
                    "Product {} does not belong to brand {}",
                    product.sku, request.brand_id
                )));
            }
            if product.quantity < line.quantity {
                return Err(insufficient_stock(&product.sku, product.quantity, line.quantity));
            }
            products.push(product);
        }
        Ok(products)
    }

    fn mirror_request(
        &self,
        request: &CreatePortalOrderRequest,
        products: &[product::Model],
    ) -> CreateOrderRequest {
        let address = Address {
            name: Some(request.customer_name.clone()),
            company: request.recipient_company.clone(),
            street1: Some(request.street1.clone()),
            street2: request.street2.clone(),
            city: Some(request.city.clone()),
            state: Some(request.state.clone()),
            postal_code: Some(request.postal_code.clone()),
            country: Some(country_or_default(request)),
            phone: request.phone.clone(),
        };
        let platform_order = PlatformOrder {
            order_id: None,
            order_number: request.order_number.clone(),
            order_key: None,
            order_date: None,
            order_status: None,
            customer_email: request.customer_email.clone(),
            customer_notes: request.notes.clone(),
            ship_to: address.clone(),
            bill_to: address,
            items: request
                .line_items
                .iter()
                .zip(products)
                .map(|(line, product)| OrderItem {
                    sku: Some(product.sku.clone()),
                    name: Some(product.product_name.clone()),
                    image_url: product.image_url.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.or(product.price),
                    upc: None,
                    warehouse_location: None,
                })
                .collect(),
            amount_paid: None,
            shipping_amount: None,
            tax_amount: None,
            externally_fulfilled: false,
            advanced_options: AdvancedOptions {
                store_id: None,
                source: Some(PORTAL_ORDER_SOURCE.to_string()),
                custom_field1: Some(request.brand_id.clone()),
            },
        };
        CreateOrderRequest::from_order(&platform_order, &self.warehouse_location)
    }

    #[instrument(skip(self, request), fields(order_number = %request.order_number, brand_id = %request.brand_id))]
    pub async fn create_order(
        &self,
        request: CreatePortalOrderRequest,
    ) -> Result<OrderWithLines, ServiceError> {
        validate_request(&request)?;
        let products = self.precheck_stock(&request).await?;
        let mirror = self.mirror_request(&request, &products);

        let draft = OrderDraft {
            order_number: request.order_number.clone(),
            order_date: Some(chrono::Utc::now()),
            is_3pl_order: true,
            brand_id: Some(request.brand_id.clone()),
            brand_name: request.brand_name.clone(),
            order_source: Some(PORTAL_ORDER_SOURCE.to_string()),
            recipient: Recipient {
                customer_email: request.customer_email.clone(),
                customer_name: Some(request.customer_name.clone()),
                company: request.recipient_company.clone(),
                street1: Some(request.street1.clone()),
                street2: request.street2.clone(),
                city: Some(request.city.clone()),
                state: Some(request.state.clone()),
                postal_code: Some(request.postal_code.clone()),
                country: Some(country_or_default(&request)),
                phone: request.phone.clone(),
            },
            carrier: request.carrier.clone(),
            tracking_number: None,
            fulfillment_channel: FulfillmentChannel::Hometown,
            shipping_amount: None,
            amount_paid: None,
            notes: request.notes.clone(),
            lines: request
                .line_items
                .iter()
                .zip(&products)
                .map(|(line, product)| DraftLine {
                    target: LineTarget::Product(line.product_id),
                    name: Some(product.product_name.clone()),
                    image_url: product.image_url.clone(),
                    quantity: line.quantity,
                    unit_price: line.unit_price.or(product.price).unwrap_or_default(),
                })
                .collect(),
            change_source: PORTAL_CHANGE_SOURCE.to_string(),
            channel: Some(PORTAL_CHANGE_SOURCE.to_string()),
            policy: DeductionPolicy::Strict,
            price_from_asin: false,
            mirror: Some(mirror),
        };

        let created = match self.materializer.materialize(draft).await? {
            MaterializeOutcome::Created(created) => created,
            MaterializeOutcome::Duplicate => {
                return Err(ServiceError::Conflict(format!(
                    "Order {} already exists",
                    request.order_number
                )))
            }
        };
        info!(order_id = %created.order.id, "portal order created");

        let summary: Vec<OrderSummaryLine> = created
            .line_items
            .iter()
            .map(|item| OrderSummaryLine {
                sku: item.sku.clone(),
                name: item.product_name.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();
        let brand_email = self.directory.notification_address(&request.brand_id);
        let message = notifications::new_order_message(
            brand_email.as_deref(),
            self.ops_email.as_deref(),
            &created.order.order_number,
            created.order.customer_name.as_deref(),
            &summary,
        );
        notifications::notify_best_effort(self.notifier.as_ref(), message).await;

        Ok(OrderWithLines {
            order: created.order,
            line_items: created.line_items,
        })
    }

    pub async fn get_order(&self, order_number: &str) -> Result<OrderWithLines, ServiceError> {
        let order = Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_number)))?;
        let line_items = OrderLineItem::find()
            .filter(order_line_item::Column::OrderId.eq(order.id))
            .order_by_asc(order_line_item::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(OrderWithLines { order, line_items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreatePortalOrderRequest {
        CreatePortalOrderRequest {
            order_number: "P-100".into(),
            brand_id: "acme@example.com".into(),
            brand_name: Some("Acme".into()),
            customer_email: Some("buyer@example.com".into()),
            customer_name: "Ada".into(),
            recipient_company: None,
            street1: "1 Main St".into(),
            street2: None,
            city: "Lincoln".into(),
            state: "NE".into(),
            postal_code: "68508".into(),
            country: Some("US".into()),
            phone: None,
            carrier: None,
            notes: None,
            line_items: vec![PortalOrderLine {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: None,
            }],
        }
    }

    #[test]
    fn valid_request_passes() {
        assert!(validate_request(&request()).is_ok());
    }

    #[test]
    fn rejects_empty_lines_bad_country_and_duplicates() {
        let mut empty = request();
        empty.line_items.clear();
        assert!(empty.validate().is_err());

        let mut bad_country = request();
        bad_country.country = Some("USA".into());
        assert!(bad_country.validate().is_err());

        let mut duplicated = request();
        let line = duplicated.line_items[0].clone();
        duplicated.line_items.push(line);
        assert!(duplicated.validate().is_err());
    }

    #[test]
    fn rejects_zero_quantity_lines() {
        let mut req = request();
        req.line_items[0].quantity = 0;
        assert!(validate_request(&req).is_err());
    }
}
