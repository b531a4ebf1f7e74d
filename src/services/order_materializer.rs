//! Persists an order, its line items and every inventory effect in one
//! transaction.

use crate::db::{is_unique_violation, DbPool};
use crate::entities::{
    order::{self, Entity as Order, FulfillmentChannel, OrderStatus},
    order_line_item, unmapped_sku,
};
use crate::errors::ServiceError;
use crate::events::{outbox, OutboundEvent};
use crate::integrations::shipstation::CreateOrderRequest;
use crate::services::fees::{self, FeeSchedule};
use crate::services::inventory_adjuster::{self, Adjustment, ChangeContext, DeductionPolicy};
use crate::services::sku_resolver::{self, Resolution, ResolvedMapping, UnmappedLine};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How a line names what it sells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineTarget {
    /// Channel SKU resolved through the mapping table
    Sku(Option<String>),
    /// Internal product chosen directly (portal entry)
    Product(Uuid),
}

#[derive(Debug, Clone)]
pub struct DraftLine {
    pub target: LineTarget,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl DraftLine {
    fn sku(&self) -> Option<&str> {
        match &self.target {
            LineTarget::Sku(sku) => sku.as_deref(),
            LineTarget::Product(_) => None,
        }
    }
}

/// Recipient and address fields copied onto the order header.
#[derive(Debug, Clone, Default)]
pub struct Recipient {
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub company: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

/// Everything needed to create one order.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub order_number: String,
    pub order_date: Option<DateTime<Utc>>,
    pub is_3pl_order: bool,
    pub brand_id: Option<String>,
    pub brand_name: Option<String>,
    pub order_source: Option<String>,
    pub recipient: Recipient,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub fulfillment_channel: FulfillmentChannel,
    pub shipping_amount: Option<Decimal>,
    pub amount_paid: Option<Decimal>,
    pub notes: Option<String>,
    pub lines: Vec<DraftLine>,
    /// Changelog `change_source`
    pub change_source: String,
    /// Store or channel recorded on unmapped SKU rows
    pub channel: Option<String>,
    pub policy: DeductionPolicy,
    /// Lines with no price take the price of the product whose ASIN equals the SKU
    pub price_from_asin: bool,
    /// Shipping-platform order to create once this commits
    pub mirror: Option<CreateOrderRequest>,
}

#[derive(Debug, Clone)]
pub struct MaterializedOrder {
    pub order: order::Model,
    pub line_items: Vec<order_line_item::Model>,
    pub adjustments: Vec<Adjustment>,
    pub unmapped: Vec<unmapped_sku::Model>,
    pub skipped_lines: usize,
    pub outbox_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum MaterializeOutcome {
    Created(Box<MaterializedOrder>),
    /// An order with this number already exists; nothing was written
    Duplicate,
}

struct ResolvedLine {
    line: DraftLine,
    unit_price: Decimal,
    mappings: Option<Vec<ResolvedMapping>>,
}

pub struct OrderMaterializer {
    db: Arc<DbPool>,
    fees: Arc<FeeSchedule>,
}

impl OrderMaterializer {
    pub fn new(db: Arc<DbPool>, fees: Arc<FeeSchedule>) -> Self {
        Self { db, fees }
    }

    pub async fn exists(&self, order_number: &str) -> Result<bool, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(self.db.as_ref())
            .await?
            .is_some())
    }

    /// Creates the order. Any error rolls back every write for this order.
    #[instrument(skip(self, draft), fields(order_number = %draft.order_number))]
    pub async fn materialize(&self, draft: OrderDraft) -> Result<MaterializeOutcome, ServiceError> {
        if self.exists(&draft.order_number).await? {
            info!("order already recorded, skipping");
            return Ok(MaterializeOutcome::Duplicate);
        }

        let txn = self.db.begin().await?;
        match self.write_order(&txn, draft).await {
            Ok(created) => {
                txn.commit().await?;
                info!(
                    order_id = %created.order.id,
                    lines = created.line_items.len(),
                    unmapped = created.unmapped.len(),
                    "order materialized"
                );
                Ok(MaterializeOutcome::Created(Box::new(created)))
            }
            Err(ServiceError::DatabaseError(err)) if is_unique_violation(&err) => {
                txn.rollback().await?;
                info!("order number claimed concurrently, treating as duplicate");
                Ok(MaterializeOutcome::Duplicate)
            }
            Err(err) => {
                txn.rollback().await?;
                Err(err)
            }
        }
    }

    async fn resolve_lines(
        &self,
        txn: &DatabaseTransaction,
        draft: &OrderDraft,
    ) -> Result<(Vec<ResolvedLine>, usize), ServiceError> {
        let mut resolved = Vec::with_capacity(draft.lines.len());
        let mut skipped = 0;

        for line in &draft.lines {
            let mappings = match &line.target {
                LineTarget::Product(product_id) => {
                    Some(vec![sku_resolver::resolve_product(txn, *product_id).await?])
                }
                LineTarget::Sku(sku) => {
                    match sku_resolver::resolve_line(
                        txn,
                        draft.brand_id.as_deref(),
                        sku.as_deref(),
                        line.name.as_deref(),
                    )
                    .await?
                    {
                        Resolution::Skipped => {
                            skipped += 1;
                            continue;
                        }
                        Resolution::Unmapped => None,
                        Resolution::Mapped(mappings) => Some(mappings),
                    }
                }
            };

            let mut unit_price = line.unit_price;
            if draft.price_from_asin && unit_price.is_zero() {
                if let Some(sku) = line.sku() {
                    if let Some(listing) = sku_resolver::find_by_asin(txn, sku).await? {
                        unit_price = listing.price.unwrap_or_default();
                    }
                }
            }

            resolved.push(ResolvedLine {
                line: line.clone(),
                unit_price,
                mappings,
            });
        }

        Ok((resolved, skipped))
    }

    async fn write_order(
        &self,
        txn: &DatabaseTransaction,
        mut draft: OrderDraft,
    ) -> Result<MaterializedOrder, ServiceError> {
        if let Some(line) = draft.lines.iter().find(|l| l.quantity < 0) {
            return Err(ServiceError::ValidationError(format!(
                "line {} has negative quantity {}",
                line.sku().unwrap_or("(no sku)"),
                line.quantity
            )));
        }
        let (lines, skipped_lines) = self.resolve_lines(txn, &draft).await?;

        if draft.brand_id.is_none() {
            if let Some(product) = lines
                .iter()
                .filter_map(|l| l.mappings.as_ref())
                .flatten()
                .map(|m| &m.product)
                .next()
            {
                draft.brand_id = Some(product.brand_id.clone());
                draft.brand_name = product.brand_name.clone();
            }
        }

        let total_unit_quantity =
            fees::total_unit_quantity(lines.iter().map(|l| l.line.quantity))?;
        let total_paid = fees::total_paid(
            draft.amount_paid,
            lines.iter().map(|l| (l.unit_price, l.line.quantity)),
        );
        let referral_fee = self
            .fees
            .referral_fee(total_paid, draft.order_source.as_deref());
        let status = if draft.fulfillment_channel.is_external() {
            OrderStatus::Shipped
        } else {
            OrderStatus::Pending
        };

        let order_id = Uuid::new_v4();
        let recipient = draft.recipient.clone();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(draft.order_number.clone()),
            order_date: Set(draft.order_date),
            is_3pl_order: Set(draft.is_3pl_order),
            brand_id: Set(draft.brand_id.clone()),
            brand_name: Set(draft.brand_name.clone()),
            order_source: Set(draft.order_source.clone()),
            customer_email: Set(recipient.customer_email),
            customer_name: Set(recipient.customer_name),
            recipient_company: Set(recipient.company),
            street1: Set(recipient.street1),
            street2: Set(recipient.street2),
            city: Set(recipient.city),
            state: Set(recipient.state),
            postal_code: Set(recipient.postal_code),
            country: Set(recipient.country),
            phone: Set(recipient.phone),
            carrier: Set(draft.carrier.clone()),
            tracking_number: Set(draft.tracking_number.clone()),
            status: Set(status.to_string()),
            fulfillment_channel: Set(draft.fulfillment_channel.to_string()),
            cost_of_shipment: Set(draft.shipping_amount),
            referral_fee: Set(referral_fee),
            total_paid: Set(total_paid),
            total_unit_quantity: Set(total_unit_quantity),
            notes: Set(draft.notes.clone()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        let ctx = ChangeContext {
            change_source: &draft.change_source,
            order_number: Some(&draft.order_number),
        };
        let mut line_items = Vec::with_capacity(lines.len());
        let mut adjustments = Vec::new();
        let mut unmapped = Vec::new();
        let mut fba_cost = Decimal::ZERO;

        for resolved in &lines {
            let line = &resolved.line;
            let first_product = resolved
                .mappings
                .as_ref()
                .and_then(|m| m.first())
                .map(|m| &m.product);

            let item = order_line_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                sku: Set(line
                    .sku()
                    .map(str::to_string)
                    .or_else(|| first_product.map(|p| p.sku.clone()))),
                asin: Set(first_product.and_then(|p| p.asin.clone())),
                product_name: Set(line
                    .name
                    .clone()
                    .or_else(|| first_product.map(|p| p.product_name.clone()))),
                image_url: Set(line
                    .image_url
                    .clone()
                    .or_else(|| first_product.and_then(|p| p.image_url.clone()))),
                product_id: Set(first_product.map(|p| p.id)),
                quantity: Set(line.quantity),
                unit_price: Set(resolved.unit_price),
                cost_of_good: Set(first_product.and_then(|p| p.cost_of_good)),
                brand_id: Set(first_product
                    .map(|p| p.brand_id.clone())
                    .or_else(|| draft.brand_id.clone())),
                brand_name: Set(first_product
                    .and_then(|p| p.brand_name.clone())
                    .or_else(|| draft.brand_name.clone())),
                ..Default::default()
            }
            .insert(txn)
            .await?;
            line_items.push(item);

            match &resolved.mappings {
                None => {
                    let row = sku_resolver::record_unmapped(
                        txn,
                        UnmappedLine {
                            sku: line.sku(),
                            brand_id: draft.brand_id.as_deref(),
                            brand_name: draft.brand_name.as_deref(),
                            order_number: &draft.order_number,
                            quantity: line.quantity,
                            source: draft.channel.as_deref(),
                            product_name: line.name.as_deref(),
                            image_url: line.image_url.as_deref(),
                        },
                    )
                    .await?;
                    unmapped.push(row);
                }
                Some(mappings) => {
                    for mapping in mappings {
                        let units = mapping.units_for(line.quantity);
                        let adjustment = inventory_adjuster::deduct(
                            txn,
                            mapping.product.id,
                            units,
                            draft.policy,
                            ctx,
                        )
                        .await?;
                        adjustments.push(adjustment);

                        if draft.fulfillment_channel.is_external() {
                            match mapping.product.fba_fee {
                                Some(fee) => fba_cost += fee * Decimal::from(line.quantity),
                                None => warn!(
                                    product_id = %mapping.product.id,
                                    "externally fulfilled product has no fba_fee"
                                ),
                            }
                        }
                    }
                }
            }
        }

        let order = if draft.fulfillment_channel.is_external() {
            let mut active: order::ActiveModel = order.into();
            active.cost_of_shipment = Set(Some(fees::round_money(fba_cost)));
            active.update(txn).await?
        } else {
            order
        };

        let outbox_id = match draft.mirror.take() {
            Some(request) => Some(
                outbox::enqueue_event(txn, &OutboundEvent::MirrorOrder { order_id, request })
                    .await?,
            ),
            None => None,
        };

        Ok(MaterializedOrder {
            order,
            line_items,
            adjustments,
            unmapped,
            skipped_lines,
            outbox_id,
        })
    }
}
