use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbound_shipment_line_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub inbound_shipment_id: Uuid,
    pub product_id: Uuid,
    pub sku: Option<String>,
    pub product_name: Option<String>,
    /// Expected units
    pub quantity: i32,
    /// `None` until the warehouse submits a count
    pub counted_quantity: Option<i32>,
    pub date_counted: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inbound_shipment::Entity",
        from = "Column::InboundShipmentId",
        to = "super::inbound_shipment::Column::Id"
    )]
    InboundShipment,
}

impl Related<super::inbound_shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InboundShipment.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
