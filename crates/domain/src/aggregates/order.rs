use crate::catalog::{CatalogSnapshot, Product};
use crate::coupon::{CouponEffect, Redemption};
use crate::errors::OrderError;
use crate::events::order_events::*;
use crate::inventory::StockReservation;
use crate::lifecycle::{LifecycleEvent, OrderStatus};
use crate::money::{Money, Quantity, Rate};
use crate::pricing::{verify_against_catalog, PriceBreakdown, PricingCalculator};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer order.
///
/// Items can change only while the order is pending and not yet finalized.
/// Every change re-runs the pricing calculator, so the five money fields are
/// always consistent with the items, the coupon and the loyalty rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    customer_id: Uuid,
    carrier_id: Option<Uuid>,
    items: Vec<OrderItem>,
    status: OrderStatus,
    order_date: DateTime<Utc>,
    delivery_date: Option<DateTime<Utc>>,
    can_cancel_until: DateTime<Utc>,
    delivery_address: String,
    coupon_code: Option<String>,
    coupon: Option<CouponEffect>,
    vat_rate: Rate,
    loyalty_rate: Rate,
    pricing: PriceBreakdown,
    finalized: bool,
    reservation: Option<StockReservation>,
    version: i64,
}

impl Order {
    /// Open a new pending order with no items. The cancellation deadline is
    /// fixed here and never moves.
    pub fn create(
        customer_id: Uuid,
        delivery_address: impl Into<String>,
        vat_rate: Rate,
        order_date: DateTime<Utc>,
        grace: Duration,
    ) -> Result<(Self, OrderCreatedEvent), OrderError> {
        let delivery_address = delivery_address.into();
        if delivery_address.trim().is_empty() {
            return Err(OrderError::Validation(
                "delivery address cannot be empty".to_string(),
            ));
        }

        let order = Self {
            id: Uuid::new_v4(),
            customer_id,
            carrier_id: None,
            items: Vec::new(),
            status: OrderStatus::Pending,
            order_date,
            delivery_date: None,
            can_cancel_until: order_date + grace,
            delivery_address,
            coupon_code: None,
            coupon: None,
            vat_rate,
            loyalty_rate: Rate::ZERO,
            pricing: PriceBreakdown::default(),
            finalized: false,
            reservation: None,
            version: 0,
        };

        let event = OrderCreatedEvent {
            order_id: order.id,
            customer_id,
            delivery_address: order.delivery_address.clone(),
            order_date,
            can_cancel_until: order.can_cancel_until,
        };

        Ok((order, event))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn customer_id(&self) -> Uuid {
        self.customer_id
    }

    pub fn carrier_id(&self) -> Option<Uuid> {
        self.carrier_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }

    pub fn delivery_date(&self) -> Option<DateTime<Utc>> {
        self.delivery_date
    }

    pub fn can_cancel_until(&self) -> DateTime<Utc> {
        self.can_cancel_until
    }

    pub fn delivery_address(&self) -> &str {
        &self.delivery_address
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    pub fn loyalty_rate(&self) -> Rate {
        self.loyalty_rate
    }

    pub fn pricing(&self) -> &PriceBreakdown {
        &self.pricing
    }

    pub fn subtotal(&self) -> Money {
        self.pricing.subtotal
    }

    pub fn vat_amount(&self) -> Money {
        self.pricing.vat_amount
    }

    pub fn discount_amount(&self) -> Money {
        self.pricing.discount_amount
    }

    pub fn loyalty_discount(&self) -> Money {
        self.pricing.loyalty_discount
    }

    pub fn total_cost(&self) -> Money {
        self.pricing.total_cost
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn reservation(&self) -> Option<&StockReservation> {
        self.reservation.as_ref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    fn calculator(&self) -> PricingCalculator {
        PricingCalculator::new(self.vat_rate)
    }

    /// Swap in a new item list. The order is unchanged if the list cannot
    /// be priced.
    fn replace_items(&mut self, items: Vec<OrderItem>) -> Result<(), OrderError> {
        self.pricing = self
            .calculator()
            .price(&items, self.coupon.as_ref(), self.loyalty_rate)?;
        self.items = items;
        self.touch();
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), OrderError> {
        if self.finalized || self.status != OrderStatus::Pending {
            return Err(OrderError::ItemsFrozen);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Add `quantity` of `product` at its current effective price. Adding a
    /// product already on the order increases that line and keeps its
    /// original unit price.
    pub fn add_item(&mut self, product: &Product, quantity: Quantity) -> Result<(), OrderError> {
        self.ensure_editable()?;
        if !quantity.is_positive() {
            return Err(OrderError::InvalidLineItem {
                product_id: product.id,
                reason: format!("quantity must be positive, got {}", quantity),
            });
        }

        let mut items = self.items.clone();
        match items.iter_mut().find(|i| i.product_id() == product.id) {
            Some(existing) => {
                let merged = existing.quantity().checked_add(quantity).ok_or_else(|| {
                    OrderError::InvalidLineItem {
                        product_id: product.id,
                        reason: format!("adding {} to {} is out of range", quantity, existing.quantity()),
                    }
                })?;
                existing.set_quantity(merged)?;
            }
            None => items.push(OrderItem::new(product, quantity)?),
        }

        self.replace_items(items)
    }

    pub fn update_quantity(&mut self, product_id: Uuid, quantity: Quantity) -> Result<(), OrderError> {
        self.ensure_editable()?;
        if !quantity.is_positive() {
            return Err(OrderError::InvalidLineItem {
                product_id,
                reason: format!("quantity must be positive, got {}", quantity),
            });
        }

        let mut items = self.items.clone();
        items
            .iter_mut()
            .find(|i| i.product_id() == product_id)
            .ok_or_else(|| OrderError::InvalidLineItem {
                product_id,
                reason: "product is not on this order".to_string(),
            })?
            .set_quantity(quantity)?;

        self.replace_items(items)
    }

    pub fn remove_item(&mut self, product_id: Uuid) -> Result<OrderItem, OrderError> {
        self.ensure_editable()?;
        let index = self
            .items
            .iter()
            .position(|i| i.product_id() == product_id)
            .ok_or_else(|| OrderError::InvalidLineItem {
                product_id,
                reason: "product is not on this order".to_string(),
            })?;
        let mut items = self.items.clone();
        let removed = items.remove(index);

        self.replace_items(items)?;
        Ok(removed)
    }

    /// Request a coupon. It is only validated and redeemed at finalization;
    /// a later call replaces the earlier code.
    pub fn apply_coupon_code(&mut self, code: impl Into<String>) -> Result<(), OrderError> {
        self.ensure_editable()?;
        let code = code.into();
        if code.trim().is_empty() {
            return Err(OrderError::Validation("coupon code cannot be empty".to_string()));
        }
        self.coupon_code = Some(code);
        self.touch();
        Ok(())
    }

    pub fn clear_coupon_code(&mut self) -> Result<(), OrderError> {
        self.ensure_editable()?;
        self.coupon_code = None;
        self.touch();
        Ok(())
    }

    /// What the order would cost with the given discounts, without changing
    /// it.
    pub fn quote(&self, coupon: Option<&CouponEffect>, loyalty_rate: Rate) -> Result<PriceBreakdown, OrderError> {
        self.calculator().price(&self.items, coupon, loyalty_rate)
    }

    /// Checks that must pass before any stock or coupon side effect happens.
    pub fn validate_for_finalization(&self, catalog: &CatalogSnapshot) -> Result<(), OrderError> {
        self.ensure_editable()?;
        verify_against_catalog(&self.items, catalog)
    }

    /// Quantities to reserve, one entry per line.
    pub fn reservation_lines(&self) -> Vec<(Uuid, Quantity)> {
        self.items
            .iter()
            .map(|i| (i.product_id(), i.quantity()))
            .collect()
    }

    /// Freeze the items and compute the final price.
    ///
    /// The caller has already reserved stock and, if a coupon code was
    /// requested, redeemed the coupon; both are recorded on the order so they
    /// can be compensated later.
    pub fn finalize(
        &mut self,
        catalog: &CatalogSnapshot,
        redemption: Option<&Redemption>,
        loyalty_rate: Rate,
        reservation: StockReservation,
        now: DateTime<Utc>,
    ) -> Result<OrderFinalizedEvent, OrderError> {
        self.ensure_editable()?;

        match (self.coupon_code.as_deref(), redemption) {
            (Some(code), Some(r)) if r.code == code && r.customer_id == self.customer_id => {}
            (None, None) => {}
            (Some(code), _) => {
                return Err(OrderError::Validation(format!(
                    "coupon {} was requested but not redeemed for this order",
                    code
                )))
            }
            (None, Some(r)) => {
                return Err(OrderError::Validation(format!(
                    "coupon {} was redeemed but not requested",
                    r.code
                )))
            }
        }
        if reservation.order_id != self.id {
            return Err(OrderError::Validation(
                "stock reservation belongs to another order".to_string(),
            ));
        }

        let coupon = redemption.map(|r| r.effect);
        let pricing = self.calculator().price_for_finalization(
            &self.items,
            catalog,
            coupon.as_ref(),
            loyalty_rate,
        )?;

        self.coupon = coupon;
        self.loyalty_rate = loyalty_rate;
        self.pricing = pricing;
        self.reservation = Some(reservation.clone());
        self.finalized = true;
        self.touch();

        Ok(OrderFinalizedEvent {
            order_id: self.id,
            items: self.items.clone(),
            pricing,
            coupon_code: self.coupon_code.clone(),
            reservation,
            finalized_at: now,
        })
    }

    fn ensure_finalized(&self) -> Result<(), OrderError> {
        if !self.finalized {
            return Err(OrderError::OrderNotFinalized);
        }
        Ok(())
    }

    /// Hand the order to a carrier. Capacity is checked by the caller.
    pub fn assign_carrier(&mut self, carrier_id: Uuid, now: DateTime<Utc>) -> Result<CarrierAssignedEvent, OrderError> {
        let next = self.status.transition(LifecycleEvent::AssignCarrier)?;
        self.ensure_finalized()?;

        self.status = next;
        self.carrier_id = Some(carrier_id);
        self.touch();

        Ok(CarrierAssignedEvent {
            order_id: self.id,
            carrier_id,
            assigned_at: now,
        })
    }

    pub fn start_transit(&mut self, now: DateTime<Utc>) -> Result<TransitStartedEvent, OrderError> {
        let next = self.status.transition(LifecycleEvent::StartTransit)?;
        let carrier_id = self.carrier_id.ok_or(OrderError::IllegalTransition {
            current: self.status,
            event: LifecycleEvent::StartTransit,
        })?;

        self.status = next;
        self.touch();

        Ok(TransitStartedEvent {
            order_id: self.id,
            carrier_id,
            started_at: now,
        })
    }

    pub fn mark_delivered(&mut self, now: DateTime<Utc>) -> Result<OrderDeliveredEvent, OrderError> {
        let next = self.status.transition(LifecycleEvent::MarkDelivered)?;
        let carrier_id = self.carrier_id.ok_or(OrderError::IllegalTransition {
            current: self.status,
            event: LifecycleEvent::MarkDelivered,
        })?;

        self.status = next;
        self.delivery_date = Some(now);
        self.touch();

        Ok(OrderDeliveredEvent {
            order_id: self.id,
            carrier_id,
            delivered_at: now,
        })
    }

    /// Cancel while the grace window is open (inclusive of its last
    /// instant). The returned event carries the stock reservation the caller
    /// must release.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<OrderCancelledEvent, OrderError> {
        let next = self.status.transition(LifecycleEvent::Cancel)?;
        if now > self.can_cancel_until {
            return Err(OrderError::IllegalTransition {
                current: self.status,
                event: LifecycleEvent::Cancel,
            });
        }

        // The reservation stays on the order until the stock is back in the
        // inventory, see `take_released_stock`.
        self.status = next;
        self.touch();

        Ok(OrderCancelledEvent {
            order_id: self.id,
            released: self.reservation.clone(),
            carrier_id: self.carrier_id,
            cancelled_at: now,
        })
    }

    /// Stock a cancelled order still holds.
    pub fn unreleased_stock(&self) -> Option<&StockReservation> {
        match self.status {
            OrderStatus::Cancelled => self.reservation.as_ref(),
            _ => None,
        }
    }

    /// Detach the stock a cancelled order still holds so it can be handed
    /// back to the inventory. Returns `None` for any other order.
    pub fn take_released_stock(&mut self) -> Option<StockReservation> {
        if self.status != OrderStatus::Cancelled {
            return None;
        }
        let reservation = self.reservation.take()?;
        self.touch();
        Some(reservation)
    }

    /// Reattach stock that could not be handed back after cancellation.
    pub fn restore_unreleased_stock(&mut self, reservation: StockReservation) -> Result<(), OrderError> {
        if self.status != OrderStatus::Cancelled || self.reservation.is_some() {
            return Err(OrderError::IllegalTransition {
                current: self.status,
                event: LifecycleEvent::Cancel,
            });
        }
        self.reservation = Some(reservation);
        self.touch();
        Ok(())
    }
}
