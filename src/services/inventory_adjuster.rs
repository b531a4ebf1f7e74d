//! Stock changes with their ledger rows.
//!
//! Every change is a compare-and-set on `products.quantity`: the row is only
//! written when it still holds the quantity that was read, and the changelog
//! row is inserted on the same connection. Callers pass an open transaction so
//! the two commit together. A lost race re-reads after a short jittered pause;
//! each failed attempt means another writer succeeded, so the attempt budget
//! bounds how many writers can contend for one product.

use crate::entities::{
    inventory_changelog,
    product::{self, Entity as Product},
};
use crate::errors::ServiceError;
use chrono::Utc;
use metrics::counter;
use rand::Rng;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

pub const MAX_CAS_ATTEMPTS: u32 = 10;
const CAS_BACKOFF_BASE_MS: u64 = 2;
const CAS_BACKOFF_CAP_MS: u64 = 50;

/// What to do when an order asks for more than is on hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductionPolicy {
    /// Floor at zero and record the smaller change
    Clamp,
    /// Fail with `InsufficientStock`
    Strict,
}

/// Changelog attribution
#[derive(Debug, Clone, Copy)]
pub struct ChangeContext<'a> {
    pub change_source: &'a str,
    pub order_number: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub product_id: Uuid,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    /// Units asked for, before clamping
    pub requested: i32,
}

impl Adjustment {
    pub fn net_change(&self) -> i32 {
        self.new_quantity - self.previous_quantity
    }

    pub fn was_clamped(&self) -> bool {
        -self.net_change() < self.requested
    }
}

/// `max(0, current - delta)`
pub fn clamped_quantity(current: i32, delta: i32) -> i32 {
    current.saturating_sub(delta).max(0)
}

pub fn insufficient_stock(sku: &str, available: i32, requested: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "Insufficient inventory for {}. Available: {}, Requested: {}",
        sku, available, requested
    ))
}

/// Pause before re-reading after a lost compare-and-set.
fn cas_backoff(attempt: u32) -> Duration {
    let ceiling = CAS_BACKOFF_BASE_MS
        .saturating_mul(1u64 << attempt.min(5))
        .min(CAS_BACKOFF_CAP_MS);
    Duration::from_millis(rand::thread_rng().gen_range(1..=ceiling))
}

async fn lost_race(product_id: Uuid, attempt: u32, operation: &str) {
    counter!("threepl_inventory_cas_conflicts_total", 1);
    warn!(product_id = %product_id, attempt, operation, "quantity changed underneath update, retrying");
    if attempt < MAX_CAS_ATTEMPTS {
        tokio::time::sleep(cas_backoff(attempt)).await;
    }
}

async fn load_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

async fn append_changelog<C: ConnectionTrait>(
    conn: &C,
    product: &product::Model,
    previous_quantity: i32,
    new_quantity: i32,
    ctx: ChangeContext<'_>,
) -> Result<(), ServiceError> {
    inventory_changelog::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        sku: Set(Some(product.sku.clone())),
        product_name: Set(Some(product.product_name.clone())),
        image_url: Set(product.image_url.clone()),
        brand_id: Set(Some(product.brand_id.clone())),
        brand_name: Set(product.brand_name.clone()),
        previous_quantity: Set(previous_quantity),
        new_quantity: Set(new_quantity),
        net_change: Set(new_quantity - previous_quantity),
        change_source: Set(ctx.change_source.to_string()),
        order_number: Set(ctx.order_number.map(str::to_string)),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Removes `delta` units of stock for an order.
#[instrument(skip(conn, ctx), fields(change_source = ctx.change_source))]
pub async fn deduct<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    delta: i32,
    policy: DeductionPolicy,
    ctx: ChangeContext<'_>,
) -> Result<Adjustment, ServiceError> {
    if delta < 0 {
        return Err(ServiceError::ValidationError(format!(
            "deduction for product {} must not be negative, got {}",
            product_id, delta
        )));
    }

    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let product = load_product(conn, product_id).await?;
        let previous = product.quantity;

        if policy == DeductionPolicy::Strict && delta > previous {
            return Err(insufficient_stock(&product.sku, previous, delta));
        }
        let new_quantity = clamped_quantity(previous, delta);

        let result = Product::update_many()
            .col_expr(product::Column::Quantity, Expr::value(new_quantity))
            .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Quantity.eq(previous))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            append_changelog(conn, &product, previous, new_quantity, ctx).await?;
            if new_quantity != previous - delta {
                warn!(
                    product_id = %product_id,
                    previous,
                    requested = delta,
                    "deduction clamped at zero"
                );
            }
            debug!(product_id = %product_id, previous, new_quantity, "stock deducted");
            return Ok(Adjustment {
                product_id,
                previous_quantity: previous,
                new_quantity,
                requested: delta,
            });
        }

        lost_race(product_id, attempt, "deduct").await;
    }

    Err(ServiceError::ConcurrentModification(product_id))
}

/// Moves `counted_delta` units from pending to on-hand for an inbound receipt.
/// On-hand stock never drops below zero; pending is not clamped and goes
/// negative when more arrives than was expected.
#[instrument(skip(conn, ctx), fields(change_source = ctx.change_source))]
pub async fn receive<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    counted_delta: i32,
    ctx: ChangeContext<'_>,
) -> Result<Adjustment, ServiceError> {
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let product = load_product(conn, product_id).await?;
        let previous = product.quantity;
        let new_quantity = previous.saturating_add(counted_delta).max(0);

        let result = Product::update_many()
            .col_expr(product::Column::Quantity, Expr::value(new_quantity))
            .col_expr(
                product::Column::PendingQuantity,
                Expr::col(product::Column::PendingQuantity).sub(counted_delta),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Quantity.eq(previous))
            .exec(conn)
            .await?;

        if result.rows_affected == 1 {
            append_changelog(conn, &product, previous, new_quantity, ctx).await?;
            return Ok(Adjustment {
                product_id,
                previous_quantity: previous,
                new_quantity,
                requested: -counted_delta,
            });
        }

        lost_race(product_id, attempt, "receive").await;
    }

    Err(ServiceError::ConcurrentModification(product_id))
}

/// Expected inbound units. A single relative update, so no retry loop.
pub async fn add_pending<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    expected: i32,
) -> Result<(), ServiceError> {
    let result = Product::update_many()
        .col_expr(
            product::Column::PendingQuantity,
            Expr::col(product::Column::PendingQuantity).add(expected),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            product_id
        )));
    }
    Ok(())
}
