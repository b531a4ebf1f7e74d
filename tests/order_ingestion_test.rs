mod common;

use common::*;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use threepl_api::entities::{
    inventory_changelog, order, order_line_item, outbox_event, unmapped_sku,
};
use threepl_api::integrations::shipstation::Order;

async fn ingest(app: &TestApp, orders: Vec<Order>) -> threepl_api::services::order_ingestor::IngestReport {
    app.shipping.set_orders(orders);
    app.state
        .ingestor
        .ingest_resource("https://ssapi.shipstation.com/orders?importBatch=1")
        .await
        .expect("ingest resource")
}

async fn stored_order(app: &TestApp, order_number: &str) -> order::Model {
    order::Entity::find()
        .filter(order::Column::OrderNumber.eq(order_number))
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("order stored")
}

#[tokio::test]
async fn brand_order_deducts_mapped_stock_and_logs_change() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "TEE-BLK-M", 5).await;
    app.seed_mapping("TEE-BLK-M", BRAND_ID, product.id, 1).await;

    let report = ingest(
        &app,
        vec![platform_order(
            "1001",
            BRAND_STORE_ID,
            json!([{ "sku": "TEE-BLK-M", "name": "Tee", "quantity": 2, "unitPrice": 12.5 }]),
        )],
    )
    .await;

    assert_eq!(report.received, 1);
    assert_eq!(report.created, 1);
    assert!(report.failed.is_empty());
    assert_eq!(app.product(product.id).await.quantity, 3);

    let order = stored_order(&app, "1001").await;
    assert!(order.is_3pl_order);
    assert_eq!(order.brand_id.as_deref(), Some(BRAND_ID));
    assert_eq!(order.status, "Pending");
    assert_eq!(order.fulfillment_channel, "Hometown");
    assert_eq!(order.total_unit_quantity, 2);
    assert_eq!(order.total_paid, Decimal::new(2500, 2));

    let changes = inventory_changelog::Entity::find()
        .filter(inventory_changelog::Column::ProductId.eq(product.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].previous_quantity, 5);
    assert_eq!(changes[0].new_quantity, 3);
    assert_eq!(changes[0].net_change, -2);
    assert_eq!(changes[0].change_source, BRAND_NAME);
    assert_eq!(changes[0].order_number.as_deref(), Some("1001"));
}

#[tokio::test]
async fn redelivered_orders_are_recorded_once() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "MUG", 10).await;
    app.seed_mapping("MUG", BRAND_ID, product.id, 1).await;
    let batch = vec![platform_order(
        "1002",
        BRAND_STORE_ID,
        json!([{ "sku": "MUG", "name": "Mug", "quantity": 4 }]),
    )];

    let first = ingest(&app, batch.clone()).await;
    let second = ingest(&app, batch).await;

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(app.product(product.id).await.quantity, 6);
    assert_eq!(
        order::Entity::find().count(app.db.as_ref()).await.unwrap(),
        1
    );
    assert_eq!(
        inventory_changelog::Entity::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn bundle_skus_deduct_every_component() {
    let app = TestApp::new().await;
    let candle = app.seed_product(BRAND_ID, "CANDLE", 20).await;
    let matches = app.seed_product(BRAND_ID, "MATCHES", 10).await;
    app.seed_mapping("GIFT-SET", BRAND_ID, candle.id, 2).await;
    app.seed_mapping("GIFT-SET", BRAND_ID, matches.id, 1).await;

    let report = ingest(
        &app,
        vec![platform_order(
            "1003",
            BRAND_STORE_ID,
            json!([{ "sku": "GIFT-SET", "name": "Gift Set", "quantity": 3 }]),
        )],
    )
    .await;

    assert_eq!(report.created, 1);
    assert_eq!(app.product(candle.id).await.quantity, 14);
    assert_eq!(app.product(matches.id).await.quantity, 7);

    let order = stored_order(&app, "1003").await;
    let items = order_line_item::Entity::find()
        .filter(order_line_item::Column::OrderId.eq(order.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, Some(candle.id));
    assert_eq!(items[0].quantity, 3);
}

#[tokio::test]
async fn unmapped_skus_are_recorded_and_reported() {
    let app = TestApp::new().await;

    let report = ingest(
        &app,
        vec![platform_order(
            "1004",
            BRAND_STORE_ID,
            json!([{ "sku": "MYSTERY", "name": "Mystery Box", "quantity": 1 }]),
        )],
    )
    .await;
    assert_eq!(report.created, 1);

    let rows = unmapped_sku::Entity::find().all(app.db.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sku.as_deref(), Some("MYSTERY"));
    assert_eq!(rows[0].brand_id.as_deref(), Some(BRAND_ID));
    assert_eq!(rows[0].order_number, "1004");
    assert_eq!(rows[0].source.as_deref(), Some(BRAND_NAME));

    let order = stored_order(&app, "1004").await;
    let items = order_line_item::Entity::find()
        .filter(order_line_item::Column::OrderId.eq(order.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].product_id, None);

    let alerts = app.notifier.messages();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].to, vec!["warehouse@threepl.test".to_string()]);
    assert!(alerts[0].body.contains("MYSTERY"));
}

#[tokio::test]
async fn skip_list_lines_leave_no_trace() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "SOAP", 8).await;
    app.seed_mapping("SOAP", BRAND_ID, product.id, 1).await;
    app.seed_skip(Some(BRAND_ID), "Gift Note").await;

    ingest(
        &app,
        vec![platform_order(
            "1005",
            BRAND_STORE_ID,
            json!([
                { "sku": "SOAP", "name": "Soap", "quantity": 2 },
                { "sku": "NOTE", "name": "Gift Note", "quantity": 1 }
            ]),
        )],
    )
    .await;

    let order = stored_order(&app, "1005").await;
    assert_eq!(order.total_unit_quantity, 2);
    let items = order_line_item::Entity::find()
        .filter(order_line_item::Column::OrderId.eq(order.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].sku.as_deref(), Some("SOAP"));
    assert_eq!(
        unmapped_sku::Entity::find().count(app.db.as_ref()).await.unwrap(),
        0
    );
    assert_eq!(app.product(product.id).await.quantity, 6);
}

#[tokio::test]
async fn oversold_stock_is_clamped_at_zero() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "LAST-ONE", 1).await;
    app.seed_mapping("LAST-ONE", BRAND_ID, product.id, 1).await;

    let report = ingest(
        &app,
        vec![platform_order(
            "1006",
            BRAND_STORE_ID,
            json!([{ "sku": "LAST-ONE", "name": "Last One", "quantity": 3 }]),
        )],
    )
    .await;

    assert_eq!(report.created, 1);
    assert_eq!(app.product(product.id).await.quantity, 0);
    let change = inventory_changelog::Entity::find()
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("changelog row");
    assert_eq!(change.previous_quantity, 1);
    assert_eq!(change.new_quantity, 0);
    assert_eq!(change.net_change, -1);
}

#[tokio::test]
async fn marketplace_orders_take_brand_and_price_from_product() {
    let app = TestApp::new().await;
    let product = app
        .seed_product_with(BRAND_ID, "SERUM", 10, |p| {
            p.asin = sea_orm::Set(Some("B00SERUM".to_string()));
            p.price = sea_orm::Set(Some(Decimal::new(2000, 2)));
        })
        .await;
    app.seed_mapping("B00SERUM", BRAND_ID, product.id, 1).await;

    let report = ingest(
        &app,
        vec![platform_order(
            "111-2222222-3333333",
            AMAZON_STORE_ID,
            json!([{ "sku": "B00SERUM", "name": "Serum", "quantity": 2 }]),
        )],
    )
    .await;
    assert_eq!(report.created, 1);

    let order = stored_order(&app, "111-2222222-3333333").await;
    assert!(!order.is_3pl_order);
    assert_eq!(order.brand_id.as_deref(), Some(BRAND_ID));
    assert_eq!(order.order_source.as_deref(), Some("amazon"));
    assert_eq!(order.total_paid, Decimal::new(4000, 2));
    assert_eq!(order.referral_fee, Decimal::new(600, 2));
    assert_eq!(app.product(product.id).await.quantity, 8);

    let change = inventory_changelog::Entity::find()
        .one(app.db.as_ref())
        .await
        .unwrap()
        .expect("changelog row");
    assert_eq!(change.change_source, "amazon");
}

#[tokio::test]
async fn externally_fulfilled_orders_ship_immediately_with_fee_cost() {
    let app = TestApp::new().await;
    let product = app
        .seed_product_with(BRAND_ID, "FBA-ITEM", 4, |p| {
            p.fba_fee = sea_orm::Set(Some(Decimal::new(350, 2)));
        })
        .await;
    app.seed_mapping("FBA-ITEM", BRAND_ID, product.id, 1).await;

    let mut order = platform_order(
        "1007",
        AMAZON_STORE_ID,
        json!([{ "sku": "FBA-ITEM", "name": "FBA Item", "quantity": 2, "unitPrice": 10 }]),
    );
    order.externally_fulfilled = true;
    ingest(&app, vec![order]).await;

    let stored = stored_order(&app, "1007").await;
    assert_eq!(stored.status, "Shipped");
    assert_eq!(stored.fulfillment_channel, "Amazon FBA");
    assert_eq!(stored.cost_of_shipment, Some(Decimal::new(700, 2)));
}

#[tokio::test]
async fn fba_fee_is_charged_per_ordered_unit_not_per_bundle_component() {
    let app = TestApp::new().await;
    let product = app
        .seed_product_with(BRAND_ID, "FBA-PAIR", 10, |p| {
            p.fba_fee = sea_orm::Set(Some(Decimal::new(350, 2)));
        })
        .await;
    app.seed_mapping("FBA-PAIR", BRAND_ID, product.id, 2).await;

    let mut order = platform_order(
        "1008",
        AMAZON_STORE_ID,
        json!([{ "sku": "FBA-PAIR", "name": "FBA Pair", "quantity": 2, "unitPrice": 10 }]),
    );
    order.externally_fulfilled = true;
    ingest(&app, vec![order]).await;

    let stored = stored_order(&app, "1008").await;
    assert_eq!(stored.cost_of_shipment, Some(Decimal::new(700, 2)));
    assert_eq!(app.product(product.id).await.quantity, 6);
}

#[tokio::test]
async fn negative_line_quantities_fail_the_order_without_touching_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "NEG", 5).await;
    app.seed_mapping("NEG", BRAND_ID, product.id, 1).await;

    let report = ingest(
        &app,
        vec![
            platform_order(
                "1009",
                BRAND_STORE_ID,
                json!([{ "sku": "NEG", "name": "Negative", "quantity": -10 }]),
            ),
            platform_order(
                "1010",
                BRAND_STORE_ID,
                json!([{ "sku": "NEG", "name": "Positive", "quantity": 1 }]),
            ),
        ],
    )
    .await;

    assert_eq!(report.created, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].order_number, "1009");
    assert_eq!(app.product(product.id).await.quantity, 4);
    assert_eq!(
        order::Entity::find()
            .filter(order::Column::OrderNumber.eq("1009"))
            .count(app.db.as_ref())
            .await
            .unwrap(),
        0
    );
    let changes = inventory_changelog::Entity::find()
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].net_change, -1);
}

#[tokio::test]
async fn oversized_unit_totals_fail_instead_of_wrapping() {
    let app = TestApp::new().await;

    let report = ingest(
        &app,
        vec![platform_order(
            "1011",
            BRAND_STORE_ID,
            json!([
                { "sku": "BULK-A", "name": "Bulk A", "quantity": 2_000_000_000 },
                { "sku": "BULK-B", "name": "Bulk B", "quantity": 2_000_000_000 }
            ]),
        )],
    )
    .await;

    assert_eq!(report.created, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(order::Entity::find().count(app.db.as_ref()).await.unwrap(), 0);
    assert_eq!(
        unmapped_sku::Entity::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn excluded_and_unknown_stores_are_not_ingested() {
    let app = TestApp::new().await;

    let report = ingest(
        &app,
        vec![
            platform_order("2001", MANUAL_STORE_ID, json!([])),
            platform_order("2002", FOREIGN_STORE_ID, json!([])),
            platform_order("2003", 9999, json!([])),
        ],
    )
    .await;

    assert_eq!(report.received, 3);
    assert_eq!(report.excluded, 1);
    assert_eq!(report.unclassified, 2);
    assert_eq!(report.created, 0);
    assert_eq!(order::Entity::find().count(app.db.as_ref()).await.unwrap(), 0);
    assert_eq!(
        outbox_event::Entity::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        0
    );
}
