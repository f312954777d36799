use serde::{Deserialize, Serialize};

use crate::errors::OrderError;
use crate::money::Rate;
use crate::pricing::validate_loyalty_rate;

/// A loyalty tier reached after a number of delivered orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoyaltyTier {
    pub min_delivered_orders: u32,
    pub rate: Rate,
}

/// Maps a customer's delivered-order count to a loyalty discount rate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LoyaltySchedule {
    tiers: Vec<LoyaltyTier>,
}

impl LoyaltySchedule {
    pub fn new(mut tiers: Vec<LoyaltyTier>) -> Result<Self, OrderError> {
        for tier in &tiers {
            validate_loyalty_rate(tier.rate)?;
        }
        tiers.sort_by_key(|t| t.min_delivered_orders);
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[LoyaltyTier] {
        &self.tiers
    }

    /// Rate of the highest tier reached, or zero below the first tier.
    pub fn rate_for(&self, delivered_orders: u32) -> Rate {
        self.tiers
            .iter()
            .rev()
            .find(|t| delivered_orders >= t.min_delivered_orders)
            .map(|t| t.rate)
            .unwrap_or(Rate::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn schedule() -> LoyaltySchedule {
        LoyaltySchedule::new(vec![
            LoyaltyTier { min_delivered_orders: 20, rate: Rate::percent(dec!(5)) },
            LoyaltyTier { min_delivered_orders: 5, rate: Rate::percent(dec!(2)) },
        ])
        .unwrap()
    }

    #[test]
    fn test_rate_for_tiers() {
        let schedule = schedule();
        assert_eq!(schedule.rate_for(0), Rate::ZERO);
        assert_eq!(schedule.rate_for(5), Rate::percent(dec!(2)));
        assert_eq!(schedule.rate_for(19), Rate::percent(dec!(2)));
        assert_eq!(schedule.rate_for(250), Rate::percent(dec!(5)));
    }

    #[test]
    fn test_rejects_full_discount_tier() {
        let result = LoyaltySchedule::new(vec![LoyaltyTier {
            min_delivered_orders: 1,
            rate: Rate::percent(dec!(100)),
        }]);
        assert!(matches!(result, Err(OrderError::InvalidLoyaltyRate(_))));
    }
}
