#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use threepl_api::{
    config::{AppConfig, BrandDescriptor, ShopRoute, StoreRoute},
    db::{self, DbConfig},
    entities::{line_item_skip, product, sku_mapping},
    errors::ServiceError,
    integrations::shipstation::{
        CreateOrderRequest, CreatedOrder, Order, ShippingPlatform, Store, TrackingUpdate,
    },
    notifications::{EmailMessage, Notifier},
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const BRAND_STORE_ID: i64 = 101;
pub const AMAZON_STORE_ID: i64 = 202;
pub const MANUAL_STORE_ID: i64 = 303;
pub const FOREIGN_STORE_ID: i64 = 404;

pub const BRAND_ID: &str = "ops@bessiesbest.com";
pub const BRAND_NAME: &str = "Bessie's Best";
pub const SHOP_SECRET: &str = "storefront-secret";

/// Shipping platform double: serves canned resources and records created orders.
#[derive(Default)]
pub struct FakeShipping {
    pub orders: Mutex<Vec<Order>>,
    pub shipments: Mutex<Vec<TrackingUpdate>>,
    pub fulfillments: Mutex<Vec<TrackingUpdate>>,
    pub created: Mutex<Vec<CreateOrderRequest>>,
    /// Errors handed out by `create_order` before it starts succeeding
    pub create_failures: Mutex<Vec<ServiceError>>,
}

impl FakeShipping {
    pub fn stores() -> Vec<Store> {
        vec![
            Store {
                store_id: BRAND_STORE_ID,
                store_name: BRAND_NAME.to_string(),
            },
            Store {
                store_id: AMAZON_STORE_ID,
                store_name: "Hometown Amazon".to_string(),
            },
            Store {
                store_id: MANUAL_STORE_ID,
                store_name: "Manual Orders".to_string(),
            },
            Store {
                store_id: FOREIGN_STORE_ID,
                store_name: "Somebody Else".to_string(),
            },
        ]
    }

    pub fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.lock().unwrap() = orders;
    }

    pub fn set_shipments(&self, shipments: Vec<TrackingUpdate>) {
        *self.shipments.lock().unwrap() = shipments;
    }

    pub fn fail_next_creates(&self, errors: Vec<ServiceError>) {
        *self.create_failures.lock().unwrap() = errors;
    }

    pub fn created_orders(&self) -> Vec<CreateOrderRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShippingPlatform for FakeShipping {
    async fn fetch_orders(&self, _resource_url: &str) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn fetch_shipments(
        &self,
        _resource_url: &str,
    ) -> Result<Vec<TrackingUpdate>, ServiceError> {
        Ok(self.shipments.lock().unwrap().clone())
    }

    async fn fetch_fulfillments(
        &self,
        _resource_url: &str,
    ) -> Result<Vec<TrackingUpdate>, ServiceError> {
        Ok(self.fulfillments.lock().unwrap().clone())
    }

    async fn list_stores(&self) -> Result<Vec<Store>, ServiceError> {
        Ok(Self::stores())
    }

    async fn create_order(
        &self,
        order: &CreateOrderRequest,
    ) -> Result<CreatedOrder, ServiceError> {
        let mut failures = self.create_failures.lock().unwrap();
        if !failures.is_empty() {
            return Err(failures.remove(0));
        }
        drop(failures);

        let mut created = self.created.lock().unwrap();
        created.push(order.clone());
        Ok(CreatedOrder {
            order_id: Some(created.len() as i64),
            order_number: Some(order.order_number.clone()),
        })
    }
}

/// Keeps every message instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    );
    cfg.db_max_connections = 1;
    cfg.db_min_connections = 1;
    cfg.notifications.ops_email = Some("warehouse@threepl.test".to_string());
    cfg.notifications.alert_on_unmapped_sku = true;

    cfg.ingestion.stores = HashMap::from([
        (
            BRAND_NAME.to_string(),
            StoreRoute::Brand(BrandDescriptor {
                brand_id: BRAND_ID.to_string(),
                brand_name: Some(BRAND_NAME.to_string()),
                notification_email: None,
            }),
        ),
        (
            "Hometown Amazon".to_string(),
            StoreRoute::Marketplace {
                order_source: "amazon".to_string(),
            },
        ),
        ("Manual Orders".to_string(), StoreRoute::Excluded),
    ]);
    cfg.ingestion.shopify_shops = HashMap::from([(
        "enduristan".to_string(),
        ShopRoute {
            brand: BrandDescriptor {
                brand_id: "login@enduristan.com".to_string(),
                brand_name: Some("Enduristan".to_string()),
                notification_email: None,
            },
            order_source: "shopify".to_string(),
            webhook_secret: Some(SHOP_SECRET.to_string()),
        },
    )]);
    cfg
}

/// Application state and router over a fresh in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DatabaseConnection>,
    pub shipping: Arc<FakeShipping>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::sqlite_in_memory())
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db = Arc::new(pool);
        let shipping = Arc::new(FakeShipping::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let state = AppState::new(db.clone(), cfg, shipping.clone(), notifier.clone());
        let router = threepl_api::app_router(state.clone());

        Self {
            router,
            state,
            db,
            shipping,
            notifier,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_raw(
        &self,
        uri: &str,
        body: Vec<u8>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = builder.body(Body::from(body)).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_product(&self, brand_id: &str, sku: &str, quantity: i32) -> product::Model {
        self.seed_product_with(brand_id, sku, quantity, |_| {}).await
    }

    /// Seeds a product and lets the caller tweak the row before insert.
    pub async fn seed_product_with<F>(
        &self,
        brand_id: &str,
        sku: &str,
        quantity: i32,
        customize: F,
    ) -> product::Model
    where
        F: FnOnce(&mut product::ActiveModel),
    {
        let mut model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            brand_id: Set(brand_id.to_string()),
            brand_name: Set(Some(BRAND_NAME.to_string())),
            sku: Set(sku.to_string()),
            asin: Set(None),
            product_name: Set(format!("Product {}", sku)),
            image_url: Set(None),
            quantity: Set(quantity),
            pending_quantity: Set(0),
            price: Set(Some(Decimal::new(1000, 2))),
            cost_of_good: Set(Some(Decimal::new(400, 2))),
            fba_fee: Set(None),
            ..Default::default()
        };
        customize(&mut model);
        model
            .insert(self.db.as_ref())
            .await
            .expect("seed product for tests")
    }

    pub async fn seed_mapping(
        &self,
        sku: &str,
        brand_id: &str,
        product_id: Uuid,
        quantity_to_deduct: i32,
    ) -> sku_mapping::Model {
        sku_mapping::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(sku.to_string()),
            brand_id: Set(brand_id.to_string()),
            product_id: Set(product_id),
            quantity_to_deduct: Set(quantity_to_deduct),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed sku mapping for tests")
    }

    pub async fn seed_skip(&self, brand_id: Option<&str>, name: &str) {
        line_item_skip::ActiveModel {
            id: Set(Uuid::new_v4()),
            brand_id: Set(brand_id.map(str::to_string)),
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .expect("seed skip entry for tests");
    }

    pub async fn product(&self, id: Uuid) -> product::Model {
        product::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .expect("load product")
            .expect("product exists")
    }
}

pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}

/// Platform order JSON in the shipping platform's wire shape.
pub fn platform_order(order_number: &str, store_id: i64, items: Value) -> Order {
    serde_json::from_value(serde_json::json!({
        "orderNumber": order_number,
        "orderDate": "2024-09-17T10:51:14.5030000",
        "customerEmail": "ada@example.com",
        "shipTo": {
            "name": "Ada Lovelace",
            "street1": "1 Analytical Way",
            "city": "Lincoln",
            "state": "NE",
            "postalCode": "68508",
            "country": "US"
        },
        "items": items,
        "externallyFulfilled": false,
        "advancedOptions": { "storeId": store_id }
    }))
    .expect("valid platform order json")
}
