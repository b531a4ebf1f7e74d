mod common;

use assert_matches::assert_matches;
use common::*;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use threepl_api::entities::inventory_changelog;
use threepl_api::errors::ServiceError;
use threepl_api::services::inbound_receipts::{
    CreateInboundShipmentRequest, InboundLineRequest, ShipmentWithLines,
};

fn shipment_request(lines: Vec<(uuid::Uuid, i32)>) -> CreateInboundShipmentRequest {
    CreateInboundShipmentRequest {
        shipment_number: Some("INB-1001".to_string()),
        brand_id: BRAND_ID.to_string(),
        brand_name: Some(BRAND_NAME.to_string()),
        carrier: Some("UPS".to_string()),
        tracking_number: None,
        expected_date: None,
        notes: None,
        line_items: lines
            .into_iter()
            .map(|(product_id, quantity)| InboundLineRequest {
                product_id,
                quantity,
            })
            .collect(),
    }
}

async fn create(app: &TestApp, lines: Vec<(uuid::Uuid, i32)>) -> ShipmentWithLines {
    app.state
        .inbound
        .create_shipment(shipment_request(lines))
        .await
        .expect("create inbound shipment")
}

#[tokio::test]
async fn creating_a_shipment_raises_pending_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "CRATE", 4).await;

    let created = create(&app, vec![(product.id, 12)]).await;

    assert_eq!(created.shipment.status, "Pending");
    assert_eq!(created.shipment.total_unit_quantity, 12);
    assert_eq!(created.line_items.len(), 1);
    let stored = app.product(product.id).await;
    assert_eq!(stored.quantity, 4);
    assert_eq!(stored.pending_quantity, 12);
}

#[tokio::test]
async fn matching_counts_mark_the_shipment_received() {
    let app = TestApp::new().await;
    let a = app.seed_product(BRAND_ID, "A", 0).await;
    let b = app.seed_product(BRAND_ID, "B", 1).await;
    let created = create(&app, vec![(a.id, 10), (b.id, 5)]).await;

    let first = app
        .state
        .inbound
        .submit_count(created.line_items[0].id, 10)
        .await
        .unwrap();
    assert_eq!(first.shipment.status, "Pending");
    assert_eq!(first.shipment.total_counted_quantity, 10);

    let second = app
        .state
        .inbound
        .submit_count(created.line_items[1].id, 5)
        .await
        .unwrap();
    assert_eq!(second.shipment.status, "Received");
    assert_eq!(second.shipment.total_counted_quantity, 15);

    let a = app.product(a.id).await;
    assert_eq!((a.quantity, a.pending_quantity), (10, 0));
    let b = app.product(b.id).await;
    assert_eq!((b.quantity, b.pending_quantity), (6, 0));

    let source_rows = inventory_changelog::Entity::find()
        .filter(inventory_changelog::Column::ChangeSource.eq("Inbound Shipment INB-1001"))
        .count(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(source_rows, 2);
}

#[tokio::test]
async fn short_counts_are_flagged_as_discrepancies() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "SHORT", 0).await;
    let created = create(&app, vec![(product.id, 10)]).await;

    let result = app
        .state
        .inbound
        .submit_count(created.line_items[0].id, 8)
        .await
        .unwrap();

    assert_eq!(result.shipment.status, "Received with Discrepancies");
    let stored = app.product(product.id).await;
    assert_eq!(stored.quantity, 8);
    assert_eq!(stored.pending_quantity, 2);
}

#[tokio::test]
async fn recounts_apply_only_the_difference() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "RECOUNT", 0).await;
    let created = create(&app, vec![(product.id, 10)]).await;
    let line_id = created.line_items[0].id;

    app.state.inbound.submit_count(line_id, 8).await.unwrap();
    let recount = app.state.inbound.submit_count(line_id, 10).await.unwrap();
    assert_eq!(recount.adjustment.as_ref().map(|a| a.net_change()), Some(2));
    assert_eq!(recount.shipment.status, "Received");

    let same_again = app.state.inbound.submit_count(line_id, 10).await.unwrap();
    assert!(same_again.adjustment.is_none());

    let stored = app.product(product.id).await;
    assert_eq!(stored.quantity, 10);
    assert_eq!(stored.pending_quantity, 0);
    assert_eq!(
        inventory_changelog::Entity::find()
            .count(app.db.as_ref())
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn products_of_other_brands_are_rejected() {
    let app = TestApp::new().await;
    let foreign = app.seed_product("someone@else.com", "THEIRS", 0).await;

    let err = app
        .state
        .inbound
        .create_shipment(shipment_request(vec![(foreign.id, 3)]))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::BadRequest(_));
    assert_eq!(app.product(foreign.id).await.pending_quantity, 0);
}

#[tokio::test]
async fn negative_counts_fail_validation() {
    let app = TestApp::new().await;
    let product = app.seed_product(BRAND_ID, "NEG", 0).await;
    let created = create(&app, vec![(product.id, 1)]).await;

    let err = app
        .state
        .inbound
        .submit_count(created.line_items[0].id, -1)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn oversized_expected_quantities_are_rejected() {
    let app = TestApp::new().await;
    let a = app.seed_product(BRAND_ID, "HUGE-A", 0).await;
    let b = app.seed_product(BRAND_ID, "HUGE-B", 0).await;

    let err = app
        .state
        .inbound
        .create_shipment(shipment_request(vec![
            (a.id, 2_000_000_000),
            (b.id, 2_000_000_000),
        ]))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(app.product(a.id).await.pending_quantity, 0);
}
