//! Order money math fixed at creation time.

use crate::config::IngestionConfig;
use crate::errors::ServiceError;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;

/// Referral fee rates keyed by lowercase order source.
#[derive(Debug, Clone, Default)]
pub struct FeeSchedule {
    rates: HashMap<String, Decimal>,
    default_rate: Decimal,
}

impl FeeSchedule {
    pub fn new(rates: HashMap<String, Decimal>, default_rate: Decimal) -> Self {
        Self {
            rates: rates
                .into_iter()
                .map(|(source, rate)| (source.to_lowercase(), rate))
                .collect(),
            default_rate,
        }
    }

    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(
            config.referral_fee_rates.clone(),
            config.default_referral_fee_rate,
        )
    }

    pub fn rate_for(&self, order_source: Option<&str>) -> Decimal {
        order_source
            .and_then(|source| self.rates.get(&source.trim().to_lowercase()))
            .copied()
            .unwrap_or(self.default_rate)
    }

    pub fn referral_fee(&self, total_paid: Decimal, order_source: Option<&str>) -> Decimal {
        round_money(total_paid * self.rate_for(order_source))
    }
}

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount the customer paid: the channel-reported figure when present,
/// otherwise the sum of line prices.
pub fn total_paid<I>(amount_paid: Option<Decimal>, lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, i32)>,
{
    amount_paid.unwrap_or_else(|| {
        round_money(
            lines
                .into_iter()
                .map(|(unit_price, quantity)| unit_price * Decimal::from(quantity))
                .sum(),
        )
    })
}

/// Sum of line quantities. Negative lines and totals past `i32::MAX` are
/// rejected rather than wrapped.
pub fn total_unit_quantity<I>(quantities: I) -> Result<i32, ServiceError>
where
    I: IntoIterator<Item = i32>,
{
    quantities.into_iter().try_fold(0i32, |total, quantity| {
        if quantity < 0 {
            return Err(ServiceError::ValidationError(format!(
                "line quantity must not be negative, got {}",
                quantity
            )));
        }
        total.checked_add(quantity).ok_or_else(|| {
            ServiceError::BadRequest("total unit quantity is too large".to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn schedule() -> FeeSchedule {
        FeeSchedule::new(
            HashMap::from([
                ("Amazon".to_string(), dec!(0.15)),
                ("walmart".to_string(), dec!(0.15)),
            ]),
            Decimal::ZERO,
        )
    }

    #[rstest]
    #[case(Some("amazon"), dec!(100.00), dec!(15.00))]
    #[case(Some("AMAZON"), dec!(19.99), dec!(3.00))]
    #[case(Some("walmart"), dec!(10.10), dec!(1.52))]
    #[case(Some("shopify"), dec!(50.00), dec!(0.00))]
    #[case(None, dec!(50.00), dec!(0.00))]
    fn referral_fee_by_source(
        #[case] source: Option<&str>,
        #[case] total: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(schedule().referral_fee(total, source), expected);
    }

    #[test]
    fn total_paid_prefers_reported_amount() {
        assert_eq!(total_paid(Some(dec!(42)), vec![(dec!(1), 1)]), dec!(42));
        assert_eq!(
            total_paid(None, vec![(dec!(4.50), 2), (dec!(1.25), 3)]),
            dec!(12.75)
        );
        assert_eq!(total_paid(None, Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn unit_totals_reject_negative_lines_and_overflow() {
        assert_eq!(total_unit_quantity([2, 0, 3]).unwrap(), 5);
        assert_matches!(
            total_unit_quantity([4, -10]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            total_unit_quantity([2_000_000_000, 2_000_000_000]),
            Err(ServiceError::BadRequest(_))
        );
    }
}
