pub mod inbound_shipment;
pub mod inbound_shipment_line_item;
pub mod inventory_changelog;
pub mod line_item_skip;
pub mod order;
pub mod order_line_item;
pub mod outbox_event;
pub mod product;
pub mod sku_mapping;
pub mod unmapped_sku;
