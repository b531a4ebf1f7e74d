use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum OrderStatus {
    Pending,
    Shipped,
    Cancelled,
}

/// Where an order ships from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum FulfillmentChannel {
    /// Picked and packed in the 3PL's own warehouse
    #[strum(serialize = "Hometown")]
    Hometown,
    /// Fulfilled by the marketplace from its own stock
    #[strum(serialize = "Amazon FBA")]
    AmazonFba,
}

impl FulfillmentChannel {
    pub fn from_externally_fulfilled(externally_fulfilled: bool) -> Self {
        if externally_fulfilled {
            FulfillmentChannel::AmazonFba
        } else {
            FulfillmentChannel::Hometown
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, FulfillmentChannel::AmazonFba)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub order_date: Option<DateTime<Utc>>,
    pub is_3pl_order: bool,
    pub brand_id: Option<String>,
    pub brand_name: Option<String>,
    pub order_source: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub recipient_company: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub status: String,
    pub fulfillment_channel: String,
    pub cost_of_shipment: Option<Decimal>,
    pub referral_fee: Decimal,
    pub total_paid: Decimal,
    pub total_unit_quantity: i32,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Option<OrderStatus> {
        self.status.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_line_item::Entity")]
    LineItems,
}

impl Related<super::order_line_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LineItems.def()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulfillment_channel_labels_match_stored_values() {
        assert_eq!(FulfillmentChannel::AmazonFba.to_string(), "Amazon FBA");
        assert_eq!(FulfillmentChannel::Hometown.as_ref(), "Hometown");
        assert_eq!(
            "Amazon FBA".parse::<FulfillmentChannel>().unwrap(),
            FulfillmentChannel::AmazonFba
        );
        assert!(FulfillmentChannel::from_externally_fulfilled(true).is_external());
    }

    #[test]
    fn order_status_round_trips_through_strings() {
        assert_eq!(OrderStatus::Pending.to_string(), "Pending");
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
    }
}
