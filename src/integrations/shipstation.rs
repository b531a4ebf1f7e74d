//! ShipStation: source of 3PL and marketplace orders, source of shipment
//! notifications, and sink for orders mirrored from other channels.

use crate::{config::ShippingConfig, errors::ServiceError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub name: Option<String>,
    pub company: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedOptions {
    pub store_id: Option<i64>,
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_field1: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub sku: Option<String>,
    pub name: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub upc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_location: Option<String>,
}

/// An order as returned by the `resource_url` of an ORDER_NOTIFY webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: Option<i64>,
    pub order_number: String,
    pub order_key: Option<String>,
    pub order_date: Option<String>,
    pub order_status: Option<String>,
    pub customer_email: Option<String>,
    pub customer_notes: Option<String>,
    #[serde(default)]
    pub ship_to: Address,
    #[serde(default)]
    pub bill_to: Address,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub amount_paid: Option<Decimal>,
    pub shipping_amount: Option<Decimal>,
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    pub externally_fulfilled: bool,
    #[serde(default)]
    pub advanced_options: AdvancedOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub store_id: i64,
    pub store_name: String,
}

/// Order creation payload for `POST /orders/createorder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub order_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_key: Option<String>,
    pub order_date: String,
    pub order_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    pub bill_to: Address,
    pub ship_to: Address,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_paid: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
    pub advanced_options: AdvancedOptions,
}

impl CreateOrderRequest {
    /// Mirror of `order` to be picked from `warehouse_location`.
    pub fn from_order(order: &Order, warehouse_location: &str) -> Self {
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        Self {
            order_number: order.order_number.clone(),
            order_key: order.order_key.clone(),
            order_date: order.order_date.clone().unwrap_or(now),
            order_status: "awaiting_shipment".to_string(),
            customer_email: order.customer_email.clone(),
            bill_to: order.bill_to.clone(),
            ship_to: order.ship_to.clone(),
            items: order
                .items
                .iter()
                .cloned()
                .map(|item| OrderItem {
                    warehouse_location: Some(warehouse_location.to_string()),
                    ..item
                })
                .collect(),
            amount_paid: order.amount_paid,
            shipping_amount: order.shipping_amount,
            tax_amount: order.tax_amount,
            customer_notes: order.customer_notes.clone(),
            advanced_options: order.advanced_options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedOrder {
    pub order_id: Option<i64>,
    pub order_number: Option<String>,
}

/// Carrier and cost data for an order that left the building, normalized from
/// either a SHIP_NOTIFY shipment or a FULFILLMENT_SHIPPED fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingUpdate {
    pub order_number: String,
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Shipment {
    order_number: String,
    tracking_number: Option<String>,
    service_code: Option<String>,
    shipment_cost: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Fulfillment {
    order_number: String,
    tracking_number: Option<String>,
    carrier_code: Option<String>,
    fulfillment_fee: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct OrdersEnvelope {
    #[serde(default)]
    orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
struct ShipmentsEnvelope {
    #[serde(default)]
    shipments: Vec<Shipment>,
}

#[derive(Debug, Deserialize)]
struct FulfillmentsEnvelope {
    #[serde(default)]
    fulfillments: Vec<Fulfillment>,
}

/// Shipping platform operations the ingestion flow depends on.
#[async_trait]
pub trait ShippingPlatform: Send + Sync {
    async fn fetch_orders(&self, resource_url: &str) -> Result<Vec<Order>, ServiceError>;

    /// Shipments from a SHIP_NOTIFY resource
    async fn fetch_shipments(&self, resource_url: &str)
        -> Result<Vec<TrackingUpdate>, ServiceError>;

    /// Marketplace fulfillments from a FULFILLMENT_SHIPPED resource
    async fn fetch_fulfillments(
        &self,
        resource_url: &str,
    ) -> Result<Vec<TrackingUpdate>, ServiceError>;

    async fn list_stores(&self) -> Result<Vec<Store>, ServiceError>;

    async fn create_order(&self, order: &CreateOrderRequest)
        -> Result<CreatedOrder, ServiceError>;
}

/// Parses ShipStation timestamps, which usually lack an offset
/// (`2024-09-17T10:51:14.5030000`) and are treated as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// HTTP client for the ShipStation v1 API
#[derive(Clone)]
pub struct ShipStationClient {
    client: reqwest::Client,
    base_url: Url,
    authorization: Option<String>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl ShipStationClient {
    pub fn new(config: &ShippingConfig) -> Result<Self, ServiceError> {
        let base_url = Url::parse(&config.api_base_url).map_err(|e| {
            ServiceError::InternalError(format!("invalid shipping api_base_url: {}", e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::InternalError(format!("http client: {}", e)))?;

        let authorization = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => Some(format!(
                "Basic {}",
                BASE64.encode(format!("{}:{}", key, secret))
            )),
            _ => None,
        };

        Ok(Self {
            client,
            base_url,
            authorization,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        })
    }

    /// Overrides the retry policy used for idempotent GET requests.
    pub fn with_retry_policy(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    /// Webhook resource URLs are followed only when they point at the
    /// configured API host; anything else would let a forged webhook make us
    /// send credentials elsewhere.
    fn resolve_resource(&self, resource_url: &str) -> Result<Url, ServiceError> {
        let url = Url::parse(resource_url)
            .map_err(|e| ServiceError::BadRequest(format!("invalid resource_url: {}", e)))?;

        if url.origin() != self.base_url.origin() {
            return Err(ServiceError::BadRequest(format!(
                "resource_url host {} is not the configured shipping platform",
                url.host_str().unwrap_or("<none>")
            )));
        }
        Ok(url)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        self.base_url
            .join(path)
            .map_err(|e| ServiceError::InternalError(format!("bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.authorization {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            match self.authorize(self.client.get(url.clone())).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.map_err(|e| {
                        ServiceError::ExternalServiceError(format!(
                            "unexpected shipping platform payload: {}",
                            e
                        ))
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    last_error = format!("shipping platform returned {}", status);
                    if !is_retryable(status) {
                        break;
                    }
                    warn!(%status, attempt, max = self.max_retries, "shipping platform request failed");
                }
                Err(e) => {
                    last_error = format!("shipping platform unreachable: {}", e);
                    warn!(error = %e, attempt, max = self.max_retries, "shipping platform request error");
                }
            }

            if attempt < self.max_retries {
                tokio::time::sleep(self.retry_base_delay * 2_u32.pow(attempt - 1)).await;
            }
        }

        Err(ServiceError::ExternalServiceError(last_error))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl ShippingPlatform for ShipStationClient {
    async fn fetch_orders(&self, resource_url: &str) -> Result<Vec<Order>, ServiceError> {
        let url = self.resolve_resource(resource_url)?;
        let envelope: OrdersEnvelope = self.get_json(url).await?;
        debug!(count = envelope.orders.len(), "fetched orders");
        Ok(envelope.orders)
    }

    async fn fetch_shipments(
        &self,
        resource_url: &str,
    ) -> Result<Vec<TrackingUpdate>, ServiceError> {
        let url = self.resolve_resource(resource_url)?;
        let envelope: ShipmentsEnvelope = self.get_json(url).await?;
        Ok(envelope
            .shipments
            .into_iter()
            .map(|s| TrackingUpdate {
                order_number: s.order_number,
                carrier: s.service_code,
                tracking_number: s.tracking_number,
                shipping_cost: s.shipment_cost,
            })
            .collect())
    }

    async fn fetch_fulfillments(
        &self,
        resource_url: &str,
    ) -> Result<Vec<TrackingUpdate>, ServiceError> {
        let url = self.resolve_resource(resource_url)?;
        let envelope: FulfillmentsEnvelope = self.get_json(url).await?;
        Ok(envelope
            .fulfillments
            .into_iter()
            .map(|f| TrackingUpdate {
                order_number: f.order_number,
                carrier: f.carrier_code,
                tracking_number: f.tracking_number,
                shipping_cost: f.fulfillment_fee,
            })
            .collect())
    }

    async fn list_stores(&self) -> Result<Vec<Store>, ServiceError> {
        let url = self.endpoint("/stores")?;
        self.get_json(url).await
    }

    /// Not retried here: the outbox dispatcher owns retries for mirrored orders.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    async fn create_order(
        &self,
        order: &CreateOrderRequest,
    ) -> Result<CreatedOrder, ServiceError> {
        let url = self.endpoint("/orders/createorder")?;
        let response = self
            .authorize(self.client.post(url))
            .json(order)
            .send()
            .await
            .map_err(|e| {
                ServiceError::ExternalServiceError(format!("shipping platform unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::ExternalServiceError(format!(
                "createorder returned {}: {}",
                status,
                body.chars().take(300).collect::<String>()
            )));
        }

        response.json::<CreatedOrder>().await.map_err(|e| {
            ServiceError::ExternalServiceError(format!("unexpected createorder response: {}", e))
        })
    }
}
