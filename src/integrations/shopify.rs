//! Shopify order webhooks: signature verification and conversion into the
//! shipping-platform order shape used by ingestion and mirroring.

use super::shipstation::{self, AdvancedOptions, Address, OrderItem};
use crate::errors::ServiceError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShopifyAddress {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub province_code: Option<String>,
    pub zip: Option<String>,
    pub country_code: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyLineItem {
    pub sku: Option<String>,
    pub title: Option<String>,
    pub quantity: i32,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyShippingLine {
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyOrder {
    pub id: i64,
    /// Display number such as `#1001`
    pub name: String,
    pub created_at: Option<String>,
    pub email: Option<String>,
    pub note: Option<String>,
    pub billing_address: Option<ShopifyAddress>,
    pub shipping_address: Option<ShopifyAddress>,
    #[serde(default)]
    pub line_items: Vec<ShopifyLineItem>,
    #[serde(default)]
    pub shipping_lines: Vec<ShopifyShippingLine>,
    pub total_discounts: Option<Decimal>,
    pub total_tax: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

/// Checks `X-Shopify-Hmac-Sha256`: base64 HMAC-SHA256 of the raw body.
pub fn verify_webhook(secret: &str, body: &[u8], signature: Option<&str>) -> Result<(), ServiceError> {
    let signature = signature
        .ok_or_else(|| ServiceError::InvalidSignature("missing HMAC header".to_string()))?;
    let expected = BASE64
        .decode(signature.trim())
        .map_err(|_| ServiceError::InvalidSignature("HMAC header is not base64".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("hmac key: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| ServiceError::InvalidSignature("HMAC mismatch".to_string()))
}

impl ShopifyAddress {
    fn display_name(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        })
    }

    fn to_platform_address(&self) -> Address {
        Address {
            name: self.display_name(),
            company: self.company.clone(),
            street1: self.address1.clone(),
            street2: self.address2.clone(),
            city: self.city.clone(),
            state: self.province_code.clone().or_else(|| self.province.clone()),
            postal_code: self.zip.clone(),
            country: Some(self.country_code.clone().unwrap_or_else(|| "US".to_string())),
            phone: self.phone.clone(),
        }
    }
}

impl ShopifyOrder {
    pub fn shipping_total(&self) -> Decimal {
        self.shipping_lines
            .iter()
            .filter_map(|line| line.price)
            .sum()
    }

    /// Shipping-platform representation of this order. `source` is stored in
    /// `advancedOptions.source` and becomes the local order source.
    pub fn to_platform_order(&self, source: &str) -> shipstation::Order {
        let ship_to = self
            .shipping_address
            .as_ref()
            .or(self.billing_address.as_ref())
            .map(ShopifyAddress::to_platform_address)
            .unwrap_or_default();
        let bill_to = self
            .billing_address
            .as_ref()
            .map(ShopifyAddress::to_platform_address)
            .unwrap_or_else(|| ship_to.clone());

        shipstation::Order {
            order_id: None,
            order_number: self.name.clone(),
            order_key: Some(self.id.to_string()),
            order_date: self.created_at.clone(),
            order_status: Some("awaiting_shipment".to_string()),
            customer_email: self.email.clone(),
            customer_notes: self.note.clone(),
            ship_to,
            bill_to,
            items: self
                .line_items
                .iter()
                .map(|item| OrderItem {
                    sku: item.sku.clone().filter(|s| !s.trim().is_empty()),
                    name: item.title.clone(),
                    image_url: None,
                    quantity: item.quantity,
                    unit_price: item.price,
                    upc: None,
                    warehouse_location: None,
                })
                .collect(),
            amount_paid: self.total_price,
            shipping_amount: Some(self.shipping_total()),
            tax_amount: self.total_tax,
            externally_fulfilled: false,
            advanced_options: AdvancedOptions {
                store_id: None,
                source: Some(source.to_string()),
                custom_field1: None,
            },
        }
    }
}
