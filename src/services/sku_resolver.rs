//! Channel SKU to product resolution, including bundle expansion and the
//! per-brand skip list.

use crate::entities::{
    line_item_skip::{self, Entity as LineItemSkip},
    product::{self, Entity as Product},
    sku_mapping::{self, Entity as SkuMapping},
    unmapped_sku,
};
use crate::errors::ServiceError;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{debug, warn};
use uuid::Uuid;

/// One product consumed by a channel SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub product: product::Model,
    /// Product units consumed per unit sold
    pub quantity_to_deduct: i32,
}

impl ResolvedMapping {
    pub fn units_for(&self, ordered: i32) -> i32 {
        self.quantity_to_deduct.saturating_mul(ordered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Named on the skip list: no line item, no inventory effect
    Skipped,
    Unmapped,
    Mapped(Vec<ResolvedMapping>),
}

/// True when `name` is on the skip list for the order's brand. Orders without
/// a brand match entries that carry no brand.
pub async fn is_skipped<C: ConnectionTrait>(
    conn: &C,
    brand_id: Option<&str>,
    name: Option<&str>,
) -> Result<bool, ServiceError> {
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return Ok(false);
    };

    let brand_condition = match brand_id {
        Some(brand_id) => Condition::all().add(line_item_skip::Column::BrandId.eq(brand_id)),
        None => Condition::all().add(line_item_skip::Column::BrandId.is_null()),
    };

    let entry = LineItemSkip::find()
        .filter(line_item_skip::Column::Name.eq(name))
        .filter(brand_condition)
        .one(conn)
        .await?;

    Ok(entry.is_some())
}

/// All mappings for `sku`. Scoped to the brand when one is known; house
/// marketplace orders carry no brand yet and search every brand's mappings.
pub async fn resolve_sku<C: ConnectionTrait>(
    conn: &C,
    sku: &str,
    brand_id: Option<&str>,
) -> Result<Vec<ResolvedMapping>, ServiceError> {
    let mut query = SkuMapping::find().filter(sku_mapping::Column::Sku.eq(sku));
    if let Some(brand_id) = brand_id {
        query = query.filter(sku_mapping::Column::BrandId.eq(brand_id));
    }

    let rows = query
        .order_by_asc(sku_mapping::Column::CreatedAt)
        .order_by_asc(sku_mapping::Column::Id)
        .find_also_related(Product)
        .all(conn)
        .await?;

    let mut resolved = Vec::with_capacity(rows.len());
    for (mapping, product) in rows {
        match product {
            Some(product) if mapping.quantity_to_deduct > 0 => resolved.push(ResolvedMapping {
                product,
                quantity_to_deduct: mapping.quantity_to_deduct,
            }),
            Some(_) => warn!(mapping_id = %mapping.id, sku, "ignoring mapping with non-positive quantity_to_deduct"),
            None => warn!(mapping_id = %mapping.id, sku, "mapping points at a missing product"),
        }
    }
    Ok(resolved)
}

/// Skip-list check followed by mapping lookup.
pub async fn resolve_line<C: ConnectionTrait>(
    conn: &C,
    brand_id: Option<&str>,
    sku: Option<&str>,
    name: Option<&str>,
) -> Result<Resolution, ServiceError> {
    if is_skipped(conn, brand_id, name).await? {
        debug!(?name, "line item on skip list");
        return Ok(Resolution::Skipped);
    }

    let Some(sku) = sku.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Resolution::Unmapped);
    };

    let mappings = resolve_sku(conn, sku, brand_id).await?;
    if mappings.is_empty() {
        Ok(Resolution::Unmapped)
    } else {
        Ok(Resolution::Mapped(mappings))
    }
}

/// Product sold directly by id (portal orders): one unit per unit ordered.
pub async fn resolve_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<ResolvedMapping, ServiceError> {
    let product = Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;
    Ok(ResolvedMapping {
        product,
        quantity_to_deduct: 1,
    })
}

/// Marketplace listings are matched to products by ASIN.
pub async fn find_by_asin<C: ConnectionTrait>(
    conn: &C,
    asin: &str,
) -> Result<Option<product::Model>, ServiceError> {
    Ok(Product::find()
        .filter(product::Column::Asin.eq(asin))
        .order_by_asc(product::Column::CreatedAt)
        .one(conn)
        .await?)
}

#[derive(Debug, Clone)]
pub struct UnmappedLine<'a> {
    pub sku: Option<&'a str>,
    pub brand_id: Option<&'a str>,
    pub brand_name: Option<&'a str>,
    pub order_number: &'a str,
    pub quantity: i32,
    pub source: Option<&'a str>,
    pub product_name: Option<&'a str>,
    pub image_url: Option<&'a str>,
}

pub async fn record_unmapped<C: ConnectionTrait>(
    conn: &C,
    line: UnmappedLine<'_>,
) -> Result<unmapped_sku::Model, ServiceError> {
    warn!(
        order_number = line.order_number,
        sku = ?line.sku,
        brand_id = ?line.brand_id,
        "no SKU mapping found"
    );
    let owned = |value: Option<&str>| value.map(str::to_string);
    let model = unmapped_sku::ActiveModel {
        id: Set(Uuid::new_v4()),
        sku: Set(owned(line.sku)),
        brand_id: Set(owned(line.brand_id)),
        brand_name: Set(owned(line.brand_name)),
        order_number: Set(line.order_number.to_string()),
        quantity: Set(line.quantity),
        source: Set(owned(line.source)),
        product_name: Set(owned(line.product_name)),
        image_url: Set(owned(line.image_url)),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(model)
}
