//! Inbound shipments: expected stock goes to `pending_quantity` on creation
//! and moves to on-hand stock as the warehouse counts each line.

use crate::db::DbPool;
use crate::entities::{
    inbound_shipment::{self, Entity as InboundShipment, InboundShipmentStatus},
    inbound_shipment_line_item::{self, Entity as InboundShipmentLineItem},
    product::Entity as Product,
};
use crate::errors::ServiceError;
use crate::services::fees;
use crate::services::inventory_adjuster::{self, Adjustment, ChangeContext};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct InboundLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100000))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateInboundShipmentRequest {
    /// Generated when absent
    #[validate(length(min = 1, max = 64))]
    pub shipment_number: Option<String>,
    #[validate(length(min = 1))]
    pub brand_id: String,
    pub brand_name: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[validate(length(min = 1))]
    pub line_items: Vec<InboundLineRequest>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct SubmitCountRequest {
    #[validate(range(min = 0, max = 100000))]
    pub counted_quantity: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShipmentWithLines {
    #[schema(value_type = Object)]
    pub shipment: inbound_shipment::Model,
    #[schema(value_type = Vec<Object>)]
    pub line_items: Vec<inbound_shipment_line_item::Model>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountResult {
    #[schema(value_type = Object)]
    pub shipment: inbound_shipment::Model,
    #[schema(value_type = Object)]
    pub line_item: inbound_shipment_line_item::Model,
    /// Absent when the submission matched the count already applied
    #[schema(value_type = Option<Object>)]
    pub adjustment: Option<Adjustment>,
}

/// Shipment status after a count. Only fully counted shipments change status.
pub fn derive_status(
    lines: &[(i32, Option<i32>)],
    current: InboundShipmentStatus,
) -> (InboundShipmentStatus, i32) {
    let total_counted = lines.iter().filter_map(|(_, counted)| *counted).sum();
    let all_counted = !lines.is_empty() && lines.iter().all(|(_, counted)| counted.is_some());
    if !all_counted {
        return (current, total_counted);
    }
    let discrepancy = lines
        .iter()
        .any(|(expected, counted)| Some(*expected) != *counted);
    let status = if discrepancy {
        InboundShipmentStatus::ReceivedWithDiscrepancies
    } else {
        InboundShipmentStatus::Received
    };
    (status, total_counted)
}

pub struct InboundReceiptService {
    db: Arc<DbPool>,
}

impl InboundReceiptService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(brand_id = %request.brand_id))]
    pub async fn create_shipment(
        &self,
        request: CreateInboundShipmentRequest,
    ) -> Result<ShipmentWithLines, ServiceError> {
        request.validate()?;
        for line in &request.line_items {
            line.validate()?;
        }

        let total_unit_quantity =
            fees::total_unit_quantity(request.line_items.iter().map(|l| l.quantity))?;

        let txn = self.db.begin().await?;
        let shipment_id = Uuid::new_v4();
        let shipment_number = request
            .shipment_number
            .clone()
            .unwrap_or_else(|| format!("INB-{}", &shipment_id.simple().to_string()[..8]));

        let shipment = inbound_shipment::ActiveModel {
            id: Set(shipment_id),
            shipment_number: Set(shipment_number),
            brand_id: Set(request.brand_id.clone()),
            brand_name: Set(request.brand_name.clone()),
            carrier: Set(request.carrier.clone()),
            tracking_number: Set(request.tracking_number.clone()),
            status: Set(InboundShipmentStatus::Pending.to_string()),
            total_unit_quantity: Set(total_unit_quantity),
            total_counted_quantity: Set(0),
            expected_date: Set(request.expected_date),
            notes: Set(request.notes.clone()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut line_items = Vec::with_capacity(request.line_items.len());
        for line in &request.line_items {
            let product = Product::find_by_id(line.product_id)
                .one(&txn)
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

            let item = inbound_shipment_line_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                inbound_shipment_id: Set(shipment_id),
                product_id: Set(product.id),
                sku: Set(Some(product.sku.clone())),
                product_name: Set(Some(product.product_name.clone())),
                quantity: Set(line.quantity),
                counted_quantity: Set(None),
                date_counted: Set(None),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            inventory_adjuster::add_pending(&txn, product.id, line.quantity).await?;
            line_items.push(item);
        }

        txn.commit().await?;
        info!(shipment_id = %shipment.id, lines = line_items.len(), "inbound shipment created");
        Ok(ShipmentWithLines {
            shipment,
            line_items,
        })
    }

    /// Records a physical count for one line. Re-submitting applies only the
    /// difference from the count already applied.
    #[instrument(skip(self))]
    pub async fn submit_count(
        &self,
        line_item_id: Uuid,
        counted_quantity: i32,
    ) -> Result<CountResult, ServiceError> {
        SubmitCountRequest { counted_quantity }.validate()?;

        let txn = self.db.begin().await?;
        let result = self.apply_count(&txn, line_item_id, counted_quantity).await?;
        txn.commit().await?;

        info!(
            shipment_id = %result.shipment.id,
            status = %result.shipment.status,
            total_counted = result.shipment.total_counted_quantity,
            "inbound count applied"
        );
        Ok(result)
    }

    async fn apply_count(
        &self,
        txn: &DatabaseTransaction,
        line_item_id: Uuid,
        counted_quantity: i32,
    ) -> Result<CountResult, ServiceError> {
        let line = InboundShipmentLineItem::find_by_id(line_item_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inbound line item {} not found", line_item_id))
            })?;
        let shipment = InboundShipment::find_by_id(line.inbound_shipment_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Inbound shipment {} not found",
                    line.inbound_shipment_id
                ))
            })?;

        let delta = counted_quantity - line.counted_quantity.unwrap_or(0);
        let product_id = line.product_id;

        let mut active_line: inbound_shipment_line_item::ActiveModel = line.into();
        active_line.counted_quantity = Set(Some(counted_quantity));
        active_line.date_counted = Set(Some(Utc::now()));
        let line = active_line.update(txn).await?;

        let change_source = format!("Inbound Shipment {}", shipment.shipment_number);
        let adjustment = if delta != 0 {
            Some(
                inventory_adjuster::receive(
                    txn,
                    product_id,
                    delta,
                    ChangeContext {
                        change_source: &change_source,
                        order_number: None,
                    },
                )
                .await?,
            )
        } else {
            None
        };

        let lines: Vec<(i32, Option<i32>)> = InboundShipmentLineItem::find()
            .filter(inbound_shipment_line_item::Column::InboundShipmentId.eq(shipment.id))
            .all(txn)
            .await?
            .into_iter()
            .map(|l| (l.quantity, l.counted_quantity))
            .collect();
        let current = shipment
            .status
            .parse()
            .unwrap_or(InboundShipmentStatus::Pending);
        let (status, total_counted) = derive_status(&lines, current);

        let mut active_shipment: inbound_shipment::ActiveModel = shipment.into();
        active_shipment.status = Set(status.to_string());
        active_shipment.total_counted_quantity = Set(total_counted);
        let shipment = active_shipment.update(txn).await?;

        Ok(CountResult {
            shipment,
            line_item: line,
            adjustment,
        })
    }

    pub async fn get_shipment(&self, shipment_id: Uuid) -> Result<ShipmentWithLines, ServiceError> {
        let shipment = InboundShipment::find_by_id(shipment_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Inbound shipment {} not found", shipment_id))
            })?;
        let line_items = InboundShipmentLineItem::find()
            .filter(inbound_shipment_line_item::Column::InboundShipmentId.eq(shipment_id))
            .order_by_asc(inbound_shipment_line_item::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(ShipmentWithLines {
            shipment,
            line_items,
        })
    }
}
