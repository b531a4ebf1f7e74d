use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::HashMap;
use threepl_api::entities::inbound_shipment::InboundShipmentStatus;
use threepl_api::events::outbox::backoff;
use threepl_api::services::fees::FeeSchedule;
use threepl_api::services::inbound_receipts::derive_status;
use threepl_api::services::inventory_adjuster::clamped_quantity;

fn schedule() -> FeeSchedule {
    FeeSchedule::new(
        HashMap::from([("amazon".to_string(), Decimal::new(15, 2))]),
        Decimal::ZERO,
    )
}

proptest! {
    #[test]
    fn deductions_never_go_negative_or_grow(current in 0i32..100_000, delta in 0i32..100_000) {
        let next = clamped_quantity(current, delta);
        prop_assert!(next >= 0);
        prop_assert!(next <= current);
        prop_assert_eq!(next, (current - delta).max(0));
    }

    #[test]
    fn referral_fees_are_cent_rounded_and_bounded(cents in 0i64..10_000_000) {
        let total = Decimal::new(cents, 2);
        let fee = schedule().referral_fee(total, Some("Amazon"));
        prop_assert!(fee.scale() <= 2);
        prop_assert!(fee <= total);
        prop_assert!(fee >= Decimal::ZERO);
        prop_assert_eq!(schedule().referral_fee(total, Some("etsy")), Decimal::ZERO);
    }

    #[test]
    fn backoff_is_monotonic_and_capped(attempt in 0i32..64) {
        let current = backoff(attempt);
        prop_assert!(current <= backoff(attempt + 1));
        prop_assert!(current.as_secs() <= 3600);
    }

    #[test]
    fn shipments_stay_pending_until_every_line_is_counted(
        lines in prop::collection::vec((1i32..50, prop::option::of(0i32..60)), 1..8)
    ) {
        let (status, total) = derive_status(&lines, InboundShipmentStatus::Pending);
        let counted: i32 = lines.iter().filter_map(|(_, c)| *c).sum();
        prop_assert_eq!(total, counted);

        if lines.iter().any(|(_, c)| c.is_none()) {
            prop_assert_eq!(status, InboundShipmentStatus::Pending);
        } else if lines.iter().all(|(expected, c)| Some(*expected) == *c) {
            prop_assert_eq!(status, InboundShipmentStatus::Received);
        } else {
            prop_assert_eq!(status, InboundShipmentStatus::ReceivedWithDiscrepancies);
        }
    }
}
