//! Durable side effects that must survive a crash after the order commits.

use crate::integrations::shipstation::CreateOrderRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod outbox;

/// Event type for orders that must be created on the shipping platform.
pub const ORDER_MIRROR_EVENT: &str = "shipping.order.mirror";

/// Events written to the outbox alongside the change that caused them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutboundEvent {
    /// Create the order on the shipping platform so the warehouse can ship it
    MirrorOrder {
        order_id: Uuid,
        request: CreateOrderRequest,
    },
}

impl OutboundEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OutboundEvent::MirrorOrder { .. } => ORDER_MIRROR_EVENT,
        }
    }

    pub fn aggregate(&self) -> (&'static str, Option<Uuid>) {
        match self {
            OutboundEvent::MirrorOrder { order_id, .. } => ("order", Some(*order_id)),
        }
    }
}
