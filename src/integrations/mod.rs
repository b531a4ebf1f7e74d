//! Clients and payload types for the external platforms orders flow through.

pub mod shipstation;
pub mod shopify;
