mod common;

use axum::http::{Method, StatusCode};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use common::*;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use sha2::Sha256;
use threepl_api::entities::{order, outbox_event};
use threepl_api::integrations::shipstation::TrackingUpdate;

fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    BASE64.encode(mac.finalize().into_bytes())
}

fn storefront_order() -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": 5501,
        "name": "#E1001",
        "created_at": "2024-09-17T10:51:14-05:00",
        "email": "rider@example.com",
        "shipping_address": {
            "first_name": "Grace",
            "last_name": "Hopper",
            "address1": "2 Compiler Ct",
            "city": "Omaha",
            "province_code": "NE",
            "zip": "68102",
            "country_code": "US"
        },
        "line_items": [{ "sku": "PACK-30L", "title": "Pack", "quantity": 1, "price": "89.00" }],
        "shipping_lines": [{ "price": "7.50" }],
        "total_price": "96.50"
    }))
    .unwrap()
}

fn portal_order(order_number: &str, product_id: uuid::Uuid, quantity: i32) -> Value {
    json!({
        "order_number": order_number,
        "brand_id": BRAND_ID,
        "brand_name": BRAND_NAME,
        "customer_email": "ada@example.com",
        "customer_name": "Ada Lovelace",
        "street1": "1 Analytical Way",
        "city": "Lincoln",
        "state": "NE",
        "postal_code": "68508",
        "line_items": [{ "product_id": product_id, "quantity": quantity }]
    })
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn order_webhook_without_resource_url_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/webhooks/shipstation/orders",
            Some(json!({ "resource_type": "ORDER_NOTIFY" })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Invalid webhook payload: no resource_url provided"));
}

#[tokio::test]
async fn order_webhook_returns_batch_report() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "TEE", 5).await;
    app.seed_mapping("TEE", BRAND_ID, product.id, 1).await;
    app.shipping.set_orders(vec![platform_order(
        "3001",
        BRAND_STORE_ID,
        json!([{ "sku": "TEE", "name": "Tee", "quantity": 1 }]),
    )]);

    let response = app
        .request(
            Method::POST,
            "/webhooks/shipstation/orders",
            Some(json!({
                "resource_url": "https://ssapi.shipstation.com/orders?importBatch=9",
                "resource_type": "ORDER_NOTIFY"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["received"], 1);
    assert_eq!(body["created"], 1);
    assert_eq!(app.product(product.id).await.quantity, 4);
}

#[tokio::test]
async fn storefront_webhook_requires_valid_signature() {
    let app = TestApp::new().await;
    let body = storefront_order();

    let forged = app
        .request_raw(
            "/webhooks/shopify/enduristan/orders",
            body.clone(),
            &[("x-shopify-hmac-sha256", sign("wrong-secret", &body).as_str())],
        )
        .await;
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let unsigned = app
        .request_raw("/webhooks/shopify/enduristan/orders", body, &[])
        .await;
    assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(order::Entity::find().count(app.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn signed_storefront_order_is_stored_and_queued_for_mirroring() {
    let app = TestApp::new().await;
    let pack = app.seed_product("login@enduristan.com", "PACK-30L", 3).await;
    app.seed_mapping("PACK-30L", "login@enduristan.com", pack.id, 1)
        .await;
    let body = storefront_order();
    let signature = sign(SHOP_SECRET, &body);

    let response = app
        .request_raw(
            "/webhooks/shopify/enduristan/orders",
            body,
            &[("x-shopify-hmac-sha256", signature.as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["created"], 1);

    let stored = order::Entity::find()
        .filter(order::Column::OrderNumber.eq("#E1001"))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("storefront order stored");
    assert_eq!(stored.brand_id.as_deref(), Some("login@enduristan.com"));
    assert_eq!(stored.order_source.as_deref(), Some("shopify"));
    assert_eq!(stored.customer_name.as_deref(), Some("Grace Hopper"));
    assert_eq!(stored.total_paid, Decimal::new(9650, 2));
    assert_eq!(app.product(pack.id).await.quantity, 2);

    let queued = outbox_event::Entity::find().all(app.db.as_ref()).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, "pending");
    assert_eq!(queued[0].aggregate_id, Some(stored.id));
}

#[tokio::test]
async fn unknown_storefronts_are_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request_raw("/webhooks/shopify/nobody/orders", storefront_order(), &[])
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn portal_orders_deduct_stock_and_notify() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "CANDLE", 5).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(portal_order("P-100", product.id, 2)),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["order"]["order_number"], "P-100");
    assert_eq!(body["data"]["order"]["country"], "US");
    assert_eq!(body["data"]["line_items"][0]["sku"], "CANDLE");

    assert_eq!(app.product(product.id).await.quantity, 3);
    let messages = app.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].to.contains(&BRAND_ID.to_string()));
    assert!(messages[0].to.contains(&"warehouse@threepl.test".to_string()));

    let fetched = app.request(Method::GET, "/api/v1/orders/P-100", None).await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(json_body(fetched).await["data"]["order"]["status"], "Pending");
}

#[tokio::test]
async fn portal_orders_beyond_stock_are_unprocessable() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "RARE", 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(portal_order("P-200", product.id, 3)),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient inventory for RARE. Available: 1, Requested: 3"));
    assert_eq!(app.product(product.id).await.quantity, 1);
    assert_eq!(order::Entity::find().count(app.db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn portal_order_numbers_are_unique() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "DUP", 10).await;
    let payload = portal_order("P-300", product.id, 1);

    let first = app
        .request(Method::POST, "/api/v1/orders", Some(payload.clone()))
        .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = app
        .request(Method::POST, "/api/v1/orders", Some(payload))
        .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(app.product(product.id).await.quantity, 9);
}

#[tokio::test]
async fn unknown_orders_are_not_found() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/orders/NOPE", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shipment_webhook_marks_pending_orders_shipped() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "SHIP-ME", 5).await;
    app.request(
        Method::POST,
        "/api/v1/orders",
        Some(portal_order("P-400", product.id, 1)),
    )
    .await;
    app.shipping.set_shipments(vec![TrackingUpdate {
        order_number: "P-400".to_string(),
        carrier: Some("usps_priority_mail".to_string()),
        tracking_number: Some("9400100000000000000000".to_string()),
        shipping_cost: Some(Decimal::new(725, 2)),
    }]);
    let notification = json!({
        "resource_url": "https://ssapi.shipstation.com/shipments?batchId=1",
        "resource_type": "SHIP_NOTIFY"
    });

    let response = app
        .request(
            Method::POST,
            "/webhooks/shipstation/shipments",
            Some(notification.clone()),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["updated"], 1);

    let stored = order::Entity::find()
        .filter(order::Column::OrderNumber.eq("P-400"))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, "Shipped");
    assert_eq!(stored.carrier.as_deref(), Some("usps_priority_mail"));
    assert_eq!(stored.cost_of_shipment, Some(Decimal::new(725, 2)));

    let redelivered = app
        .request(
            Method::POST,
            "/webhooks/shipstation/shipments",
            Some(notification),
        )
        .await;
    let body = json_body(redelivered).await;
    assert_eq!(body["updated"], 0);
    assert_eq!(body["skipped"], 1);
}

#[tokio::test]
async fn inbound_shipment_endpoints_round_out_receiving() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "BOX", 0).await;

    let created = app
        .request(
            Method::POST,
            "/api/v1/inbound-shipments",
            Some(json!({
                "brand_id": BRAND_ID,
                "line_items": [{ "product_id": product.id, "quantity": 6 }]
            })),
        )
        .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = json_body(created).await;
    let shipment_id = body["data"]["shipment"]["id"].as_str().unwrap().to_string();
    let line_id = body["data"]["line_items"][0]["id"].as_str().unwrap().to_string();
    assert!(body["data"]["shipment"]["shipment_number"]
        .as_str()
        .unwrap()
        .starts_with("INB-"));

    let counted = app
        .request(
            Method::PUT,
            &format!("/api/v1/inbound-shipments/line-items/{}/count", line_id),
            Some(json!({ "counted_quantity": 6 })),
        )
        .await;
    assert_eq!(counted.status(), StatusCode::OK);
    assert_eq!(json_body(counted).await["data"]["shipment"]["status"], "Received");

    let fetched = app
        .request(
            Method::GET,
            &format!("/api/v1/inbound-shipments/{}", shipment_id),
            None,
        )
        .await;
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(app.product(product.id).await.quantity, 6);
}
