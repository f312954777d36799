use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::OrderError;
use crate::money::{Money, Rate};

/// A single-use coupon issued to one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub code: String,
    pub discount_amount: Option<Money>,
    pub discount_percent: Option<Rate>,
    pub expiry_date: DateTime<Utc>,
    pub is_used: bool,
}

impl Coupon {
    pub fn flat(customer_id: Uuid, code: impl Into<String>, amount: Money, expiry_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            code: code.into(),
            discount_amount: Some(amount),
            discount_percent: None,
            expiry_date,
            is_used: false,
        }
    }

    pub fn percent(customer_id: Uuid, code: impl Into<String>, percent: Rate, expiry_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            code: code.into(),
            discount_amount: None,
            discount_percent: Some(percent),
            expiry_date,
            is_used: false,
        }
    }

    /// The discount this coupon grants. A positive flat amount wins over the
    /// percent; the two are never summed.
    pub fn effect(&self) -> CouponEffect {
        match (self.discount_amount, self.discount_percent) {
            (Some(amount), _) if amount.is_positive() => CouponEffect::Flat(amount),
            (_, Some(percent)) => CouponEffect::Percent(percent),
            _ => CouponEffect::Flat(Money::ZERO),
        }
    }

    /// Checks ownership, use and expiry, in that order.
    fn check(&self, customer_id: Uuid, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.customer_id != customer_id {
            return Err(OrderError::CouponNotOwned(self.code.clone()));
        }
        if self.is_used {
            return Err(OrderError::CouponAlreadyUsed(self.code.clone()));
        }
        if now >= self.expiry_date {
            return Err(OrderError::CouponExpired(self.code.clone()));
        }
        Ok(())
    }

    /// Compare-and-set on the used flag.
    fn mark_used(&mut self) -> Result<(), OrderError> {
        if self.is_used {
            return Err(OrderError::CouponAlreadyUsed(self.code.clone()));
        }
        self.is_used = true;
        Ok(())
    }
}

/// Resolved discount of a coupon, independent of any particular subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CouponEffect {
    Flat(Money),
    Percent(Rate),
}

impl CouponEffect {
    /// Unrounded discount on `subtotal`. Percent discounts apply to the
    /// subtotal, never to a VAT-inclusive amount.
    pub fn discount_on(&self, subtotal: Money) -> Money {
        match self {
            CouponEffect::Flat(amount) => *amount,
            CouponEffect::Percent(rate) => rate.of(subtotal),
        }
    }
}

/// Proof that a coupon was redeemed for an order. Handing it back to
/// [`CouponBook::rollback`] undoes the redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Redemption {
    pub coupon_id: Uuid,
    pub code: String,
    pub customer_id: Uuid,
    pub effect: CouponEffect,
    pub discount_amount: Money,
}

/// All known coupons keyed by code.
#[derive(Debug, Clone, Default)]
pub struct CouponBook {
    coupons: HashMap<String, Coupon>,
}

impl CouponBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coupon: Coupon) {
        self.coupons.insert(coupon.code.clone(), coupon);
    }

    pub fn get(&self, code: &str) -> Option<&Coupon> {
        self.coupons.get(code)
    }

    /// Run every redemption check and compute the discount without marking
    /// the coupon used.
    pub fn evaluate(
        &self,
        code: &str,
        customer_id: Uuid,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Redemption, OrderError> {
        let coupon = self
            .coupons
            .get(code)
            .ok_or_else(|| OrderError::CouponNotFound(code.to_string()))?;
        coupon.check(customer_id, now)?;

        let effect = coupon.effect();
        Ok(Redemption {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            customer_id,
            effect,
            discount_amount: effect.discount_on(subtotal).rounded(),
        })
    }

    /// Validate and redeem. The coupon is marked used exactly once; a second
    /// call for the same code fails with `CouponAlreadyUsed`.
    pub fn resolve(
        &mut self,
        code: &str,
        customer_id: Uuid,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Redemption, OrderError> {
        let redemption = self.evaluate(code, customer_id, subtotal, now)?;
        let coupon = self
            .coupons
            .get_mut(code)
            .ok_or_else(|| OrderError::CouponNotFound(code.to_string()))?;
        coupon.mark_used()?;
        Ok(redemption)
    }

    /// Compensating action for [`CouponBook::resolve`].
    pub fn rollback(&mut self, redemption: &Redemption) -> Result<(), OrderError> {
        let coupon = self
            .coupons
            .get_mut(&redemption.code)
            .filter(|c| c.id == redemption.coupon_id)
            .ok_or_else(|| OrderError::CouponNotFound(redemption.code.clone()))?;
        coupon.is_used = false;
        Ok(())
    }
}
