use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogSnapshot;
use crate::coupon::CouponEffect;
use crate::errors::OrderError;
use crate::events::order_events::OrderItem;
use crate::money::{Money, Rate};

/// The five money fields of an order, all rounded to cents.
///
/// `total_cost == subtotal + vat_amount - discount_amount - loyalty_discount`
/// always holds, and `total_cost` is never negative.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub loyalty_discount: Money,
    pub vat_amount: Money,
    pub total_cost: Money,
}

impl PriceBreakdown {
    /// Subtotal after both discounts, before VAT.
    pub fn taxable_base(&self) -> Money {
        (self.subtotal - self.discount_amount - self.loyalty_discount).non_negative()
    }
}

/// Computes order totals. Discounts are applied before VAT, in a fixed order:
/// coupon first, then loyalty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricingCalculator {
    vat_rate: Rate,
}

impl PricingCalculator {
    pub fn new(vat_rate: Rate) -> Self {
        Self { vat_rate }
    }

    pub fn vat_rate(&self) -> Rate {
        self.vat_rate
    }

    /// Price a list of items. Pure: the same inputs always give the same
    /// breakdown.
    pub fn price(
        &self,
        items: &[OrderItem],
        coupon: Option<&CouponEffect>,
        loyalty_rate: Rate,
    ) -> Result<PriceBreakdown, OrderError> {
        validate_loyalty_rate(loyalty_rate)?;
        for item in items {
            if !item.quantity().is_positive() {
                return Err(OrderError::InvalidLineItem {
                    product_id: item.product_id(),
                    reason: format!("quantity must be positive, got {}", item.quantity()),
                });
            }
            if item.unit_price().is_negative() {
                return Err(OrderError::InvalidLineItem {
                    product_id: item.product_id(),
                    reason: format!("unit price must not be negative, got {}", item.unit_price()),
                });
            }
        }

        let raw_subtotal = items.iter().try_fold(Money::ZERO, |acc, item| {
            acc.checked_add(item.subtotal())
                .ok_or_else(|| OrderError::InvalidLineItem {
                    product_id: item.product_id(),
                    reason: "order subtotal is out of range".to_string(),
                })
        })?;
        let subtotal = raw_subtotal.rounded();

        // Caps keep the taxable base non-negative, so the total identity
        // holds exactly instead of only up to the clamp.
        let discount_amount = coupon
            .map(|c| c.discount_on(raw_subtotal).rounded().non_negative())
            .unwrap_or(Money::ZERO)
            .min(subtotal);
        let loyalty_discount = loyalty_rate
            .of(raw_subtotal)
            .rounded()
            .min(subtotal - discount_amount);

        let taxable_base = (subtotal - discount_amount - loyalty_discount).non_negative();
        let vat_amount = self.vat_rate.of(taxable_base).rounded();
        let total_cost = taxable_base
            .checked_add(vat_amount)
            .ok_or_else(|| OrderError::Validation("order total is out of range".to_string()))?
            .non_negative();

        Ok(PriceBreakdown {
            subtotal,
            discount_amount,
            loyalty_discount,
            vat_amount,
            total_cost,
        })
    }

    /// Price an order that is about to be frozen. Every item must still match
    /// the catalog price it was snapshotted at, so a price change between
    /// adding and checking out never goes unnoticed.
    pub fn price_for_finalization(
        &self,
        items: &[OrderItem],
        catalog: &CatalogSnapshot,
        coupon: Option<&CouponEffect>,
        loyalty_rate: Rate,
    ) -> Result<PriceBreakdown, OrderError> {
        verify_against_catalog(items, catalog)?;
        self.price(items, coupon, loyalty_rate)
    }
}

/// Check that an item list is non-empty and agrees with the catalog.
pub fn verify_against_catalog(items: &[OrderItem], catalog: &CatalogSnapshot) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    for item in items {
        let product = catalog
            .get_product(item.product_id())
            .map_err(|_| OrderError::InvalidLineItem {
                product_id: item.product_id(),
                reason: "product is no longer in the catalog".to_string(),
            })?;

        let current = product.effective_price();
        if current != item.unit_price() {
            return Err(OrderError::InvalidLineItem {
                product_id: item.product_id(),
                reason: format!(
                    "unit price {} no longer matches catalog price {}",
                    item.unit_price(),
                    current
                ),
            });
        }
    }

    Ok(())
}

pub fn validate_loyalty_rate(rate: Rate) -> Result<(), OrderError> {
    if rate.points() < Decimal::ZERO || rate.points() >= Decimal::ONE_HUNDRED {
        return Err(OrderError::InvalidLoyaltyRate(rate));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Product;
    use crate::money::Quantity;
    use rust_decimal_macros::dec;

    fn calculator() -> PricingCalculator {
        PricingCalculator::new(Rate::from_fraction(dec!(0.20)))
    }

    fn item(price: Decimal, kg: Decimal) -> OrderItem {
        let product = Product::new("Tomatoes", "Vegetables", Money::new(price), Quantity::kg(dec!(100)));
        OrderItem::new(&product, Quantity::kg(kg)).unwrap()
    }

    fn assert_identity(b: &PriceBreakdown) {
        assert_eq!(
            b.total_cost,
            b.subtotal + b.vat_amount - b.discount_amount - b.loyalty_discount
        );
        assert!(!b.total_cost.is_negative());
    }

    #[test]
    fn test_reference_scenario() {
        let items = vec![item(dec!(10.00), dec!(2))];
        let coupon = CouponEffect::Percent(Rate::percent(dec!(10)));

        let b = calculator()
            .price(&items, Some(&coupon), Rate::percent(dec!(5)))
            .unwrap();

        assert_eq!(b.subtotal, Money::new(dec!(20.00)));
        assert_eq!(b.discount_amount, Money::new(dec!(2.00)));
        assert_eq!(b.loyalty_discount, Money::new(dec!(1.00)));
        assert_eq!(b.taxable_base(), Money::new(dec!(17.00)));
        assert_eq!(b.vat_amount, Money::new(dec!(3.40)));
        assert_eq!(b.total_cost, Money::new(dec!(20.40)));
        assert_identity(&b);
    }

    #[test]
    fn test_flat_coupon_larger_than_subtotal_is_capped() {
        let items = vec![item(dec!(1.00), dec!(0.5))];
        let coupon = CouponEffect::Flat(Money::new(dec!(5.00)));

        let b = calculator()
            .price(&items, Some(&coupon), Rate::percent(dec!(10)))
            .unwrap();

        assert_eq!(b.discount_amount, Money::new(dec!(0.50)));
        assert_eq!(b.loyalty_discount, Money::ZERO);
        assert_eq!(b.vat_amount, Money::ZERO);
        assert_eq!(b.total_cost, Money::ZERO);
        assert_identity(&b);
    }

    #[test]
    fn test_identity_holds_for_awkward_weights() {
        let items = vec![
            item(dec!(3.99), dec!(0.333)),
            item(dec!(7.49), dec!(1.125)),
            item(dec!(0.89), dec!(2.7)),
        ];
        let coupon = CouponEffect::Percent(Rate::percent(dec!(15)));

        for loyalty in [dec!(0), dec!(2), dec!(5), dec!(7.5)] {
            let b = calculator()
                .price(&items, Some(&coupon), Rate::percent(loyalty))
                .unwrap();
            assert_identity(&b);
        }
    }

    #[test]
    fn test_pricing_is_idempotent() {
        let items = vec![item(dec!(2.35), dec!(1.7))];
        let coupon = CouponEffect::Flat(Money::new(dec!(1)));
        let calc = calculator();

        let first = calc.price(&items, Some(&coupon), Rate::percent(dec!(3))).unwrap();
        let second = calc.price(&items, Some(&coupon), Rate::percent(dec!(3))).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_loyalty_rate_out_of_range() {
        let items = vec![item(dec!(1), dec!(1))];
        let err = calculator()
            .price(&items, None, Rate::percent(dec!(100)))
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidLoyaltyRate(_)));
    }

    #[test]
    fn test_finalization_requires_items() {
        let err = calculator()
            .price_for_finalization(&[], &CatalogSnapshot::default(), None, Rate::ZERO)
            .unwrap_err();
        assert_eq!(err, OrderError::EmptyOrder);
    }

    #[test]
    fn test_finalization_detects_price_drift() {
        let mut product = Product::new("Basil", "Herbs", Money::new(dec!(20)), Quantity::kg(dec!(3)));
        let items = vec![OrderItem::new(&product, Quantity::kg(dec!(0.1))).unwrap()];
        product.price_per_kg = Money::new(dec!(22));
        let catalog = CatalogSnapshot::new(vec![product]);

        let err = calculator()
            .price_for_finalization(&items, &catalog, None, Rate::ZERO)
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidLineItem { .. }));
    }

    #[test]
    fn test_subtotal_overflow_is_an_error() {
        let items = vec![item(Decimal::MAX, dec!(0.6)), item(Decimal::MAX, dec!(0.6))];
        let err = calculator().price(&items, None, Rate::ZERO).unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidLineItem { product_id, .. } if product_id == items[1].product_id()
        ));
    }
}
