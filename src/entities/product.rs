use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked SKU owned by a brand. `quantity` is on-hand stock and never drops
/// below zero through order deductions; `pending_quantity` tracks inbound stock
/// that has not been counted yet.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub brand_id: String,
    pub brand_name: Option<String>,
    pub sku: String,
    pub asin: Option<String>,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity: i32,
    pub pending_quantity: i32,
    pub price: Option<Decimal>,
    pub cost_of_good: Option<Decimal>,
    pub fba_fee: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sku_mapping::Entity")]
    SkuMappings,
    #[sea_orm(has_many = "super::inventory_changelog::Entity")]
    Changelog,
}

impl Related<super::sku_mapping::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SkuMappings.def()
    }
}

impl Related<super::inventory_changelog::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Changelog.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
