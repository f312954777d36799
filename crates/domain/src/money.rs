use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of decimal places kept on every priced field.
pub const MONEY_SCALE: u32 = 2;

/// Monetary amount in the store currency.
///
/// Arithmetic is exact; rounding only happens through [`Money::rounded`],
/// which the pricing calculator applies once per produced field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Round half away from zero to [`MONEY_SCALE`] places.
    pub fn rounded(self) -> Self {
        Self(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Clamp negative amounts to zero.
    pub fn non_negative(self) -> Self {
        if self.is_negative() {
            Self::ZERO
        } else {
            self
        }
    }

    /// `None` if the sum does not fit in a decimal.
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Price per kilogram times weight, or `None` on overflow.
    pub fn checked_mul(self, rhs: Quantity) -> Option<Money> {
        self.0.checked_mul(rhs.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

/// Weight in kilograms. Products are sold by weight, so quantities are
/// fractional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn kg(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, rhs: Quantity) -> Option<Quantity> {
        self.0.checked_add(rhs.0).map(Quantity)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kg", self.0.normalize())
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        self.0 += rhs.0;
    }
}

impl Sub for Quantity {
    type Output = Quantity;

    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 - rhs.0)
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        self.0 -= rhs.0;
    }
}

/// A percentage, stored as percent points (`20` means 20%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    pub fn percent(points: Decimal) -> Self {
        Self(points)
    }

    /// Build from a fraction such as `0.20` for 20%.
    pub fn from_fraction(fraction: Decimal) -> Self {
        Self(fraction * Decimal::ONE_HUNDRED)
    }

    pub fn points(&self) -> Decimal {
        self.0
    }

    pub fn fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The share of `amount` this rate represents, unrounded.
    pub fn of(&self, amount: Money) -> Money {
        Money(amount.0 * self.fraction())
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounding_is_half_away_from_zero() {
        assert_eq!(Money::new(dec!(2.345)).rounded(), Money::new(dec!(2.35)));
        assert_eq!(Money::new(dec!(2.344)).rounded(), Money::new(dec!(2.34)));
        assert_eq!(Money::new(dec!(-2.345)).rounded(), Money::new(dec!(-2.35)));
    }

    #[test]
    fn test_price_times_weight() {
        let price = Money::new(dec!(3.99));
        let weight = Quantity::kg(dec!(0.75));
        assert_eq!(price.checked_mul(weight).unwrap().amount(), dec!(2.9925));
    }

    #[test]
    fn test_checked_arithmetic_reports_overflow() {
        let huge = Quantity::kg(Decimal::MAX);
        assert_eq!(Money::new(dec!(2.00)).checked_mul(huge), None);
        assert_eq!(huge.checked_add(Quantity::kg(dec!(1))), None);
        assert_eq!(Money::new(Decimal::MAX).checked_add(Money::new(dec!(1))), None);
        assert_eq!(
            Quantity::kg(dec!(1.5)).checked_add(Quantity::kg(dec!(0.25))),
            Some(Quantity::kg(dec!(1.75)))
        );
    }

    #[test]
    fn test_decimal_sum_has_no_float_drift() {
        let total: Money = (0..10).map(|_| Money::new(dec!(0.1))).sum();
        assert_eq!(total, Money::new(dec!(1.0)));
    }

    #[test]
    fn test_rate_of_amount() {
        let vat = Rate::from_fraction(dec!(0.20));
        assert_eq!(vat.points(), dec!(20));
        assert_eq!(vat.of(Money::new(dec!(17))).rounded(), Money::new(dec!(3.40)));
    }

    #[test]
    fn test_non_negative_clamps() {
        assert_eq!(Money::new(dec!(-0.01)).non_negative(), Money::ZERO);
        assert_eq!(Money::new(dec!(4)).non_negative(), Money::new(dec!(4)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::new(dec!(20.4)).to_string(), "20.40");
        assert_eq!(Quantity::kg(dec!(1.500)).to_string(), "1.5 kg");
        assert_eq!(Rate::percent(dec!(5)).to_string(), "5%");
    }
}
