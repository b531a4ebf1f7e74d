//! Shipment notifications from the shipping platform: pending orders get their
//! carrier, tracking number and cost, and move to `Shipped`.

use crate::db::DbPool;
use crate::entities::order::{self, Entity as Order, OrderStatus};
use crate::errors::ServiceError;
use crate::integrations::shipstation::{ShippingPlatform, TrackingUpdate};
use crate::notifications::{self, Notifier};
use crate::services::brand_directory::BrandDirectory;
use crate::services::order_ingestor::FailedOrder;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

/// Which kind of resource a tracking webhook points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingSource {
    Shipments,
    Fulfillments,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TrackingReport {
    pub received: usize,
    pub updated: usize,
    /// No pending order with that number
    pub skipped: usize,
    pub failed: Vec<FailedOrder>,
}

pub struct TrackingService {
    db: Arc<DbPool>,
    shipping: Arc<dyn ShippingPlatform>,
    directory: Arc<BrandDirectory>,
    notifier: Arc<dyn Notifier>,
}

impl TrackingService {
    pub fn new(
        db: Arc<DbPool>,
        shipping: Arc<dyn ShippingPlatform>,
        directory: Arc<BrandDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            db,
            shipping,
            directory,
            notifier,
        }
    }

    #[instrument(skip(self))]
    pub async fn process_resource(
        &self,
        source: TrackingSource,
        resource_url: &str,
    ) -> Result<TrackingReport, ServiceError> {
        let updates = match source {
            TrackingSource::Shipments => self.shipping.fetch_shipments(resource_url).await?,
            TrackingSource::Fulfillments => self.shipping.fetch_fulfillments(resource_url).await?,
        };

        let mut report = TrackingReport::default();
        for update in &updates {
            report.received += 1;
            match self.apply(update).await {
                Ok(true) => report.updated += 1,
                Ok(false) => report.skipped += 1,
                Err(err) => {
                    warn!(order_number = %update.order_number, error = %err, "tracking update failed");
                    report.failed.push(FailedOrder {
                        order_number: update.order_number.clone(),
                        error: err.response_message(),
                    });
                }
            }
        }
        info!(?report, "tracking updates processed");
        Ok(report)
    }

    /// Returns false when no pending order matched. The status filter on the
    /// update makes redelivered notifications a no-op.
    pub async fn apply(&self, update: &TrackingUpdate) -> Result<bool, ServiceError> {
        let db = self.db.as_ref();
        let mut statement = Order::update_many()
            .col_expr(order::Column::Carrier, Expr::value(update.carrier.clone()))
            .col_expr(
                order::Column::TrackingNumber,
                Expr::value(update.tracking_number.clone()),
            )
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Shipped.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(chrono::Utc::now())))
            .filter(order::Column::OrderNumber.eq(update.order_number.as_str()))
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()));
        // keep the cost captured at ingestion when the platform reports none
        if let Some(cost) = update.shipping_cost {
            statement = statement.col_expr(order::Column::CostOfShipment, Expr::value(Some(cost)));
        }
        let result = statement.exec(db).await?;

        if result.rows_affected == 0 {
            debug!(order_number = %update.order_number, "no pending order for tracking update");
            return Ok(false);
        }

        let brand_id = Order::find()
            .filter(order::Column::OrderNumber.eq(update.order_number.as_str()))
            .one(db)
            .await?
            .and_then(|o| o.brand_id);
        let recipient = brand_id
            .as_deref()
            .and_then(|id| self.directory.notification_address(id));
        let message = notifications::tracking_message(
            recipient.as_deref(),
            &update.order_number,
            update.carrier.as_deref(),
            update.tracking_number.as_deref(),
        );
        notifications::notify_best_effort(self.notifier.as_ref(), message).await;
        Ok(true)
    }
}
