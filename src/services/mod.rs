pub mod brand_directory;
pub mod fees;
pub mod inbound_receipts;
pub mod inventory_adjuster;
pub mod manual_orders;
pub mod order_ingestor;
pub mod order_materializer;
pub mod sku_resolver;
pub mod tracking;
