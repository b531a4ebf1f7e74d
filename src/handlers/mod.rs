pub mod common;
pub mod health;
pub mod inbound_shipments;
pub mod orders;
pub mod webhooks;
