use super::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Product;
use crate::errors::OrderError;
use crate::inventory::StockReservation;
use crate::money::{Money, Quantity};
use crate::pricing::PriceBreakdown;

/// One weighed product on an order. The unit price is captured when the item
/// is added and never changes afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    product_id: Uuid,
    product_name: String,
    quantity: Quantity,
    unit_price: Money,
    subtotal: Money,
}

impl OrderItem {
    pub fn new(product: &Product, quantity: Quantity) -> Result<Self, OrderError> {
        let unit_price = product.effective_price();
        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price,
            subtotal: line_subtotal(product.id, unit_price, quantity)?,
        })
    }

    pub fn product_id(&self) -> Uuid {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    /// Unrounded `quantity * unit_price`.
    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    /// Leaves the item untouched when the new subtotal is out of range.
    pub(crate) fn set_quantity(&mut self, quantity: Quantity) -> Result<(), OrderError> {
        self.subtotal = line_subtotal(self.product_id, self.unit_price, quantity)?;
        self.quantity = quantity;
        Ok(())
    }
}

fn line_subtotal(product_id: Uuid, unit_price: Money, quantity: Quantity) -> Result<Money, OrderError> {
    unit_price
        .checked_mul(quantity)
        .ok_or_else(|| OrderError::InvalidLineItem {
            product_id,
            reason: format!("subtotal of {} at {} per kg is out of range", quantity, unit_price),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub delivery_address: String,
    pub order_date: DateTime<Utc>,
    pub can_cancel_until: DateTime<Utc>,
}

impl DomainEvent for OrderCreatedEvent {
    fn event_type() -> &'static str {
        "OrderCreated"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.order_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderFinalizedEvent {
    pub order_id: Uuid,
    pub items: Vec<OrderItem>,
    pub pricing: PriceBreakdown,
    pub coupon_code: Option<String>,
    pub reservation: StockReservation,
    pub finalized_at: DateTime<Utc>,
}

impl DomainEvent for OrderFinalizedEvent {
    fn event_type() -> &'static str {
        "OrderFinalized"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.finalized_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierAssignedEvent {
    pub order_id: Uuid,
    pub carrier_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

impl DomainEvent for CarrierAssignedEvent {
    fn event_type() -> &'static str {
        "CarrierAssigned"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.assigned_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitStartedEvent {
    pub order_id: Uuid,
    pub carrier_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl DomainEvent for TransitStartedEvent {
    fn event_type() -> &'static str {
        "TransitStarted"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDeliveredEvent {
    pub order_id: Uuid,
    pub carrier_id: Uuid,
    pub delivered_at: DateTime<Utc>,
}

impl DomainEvent for OrderDeliveredEvent {
    fn event_type() -> &'static str {
        "OrderDelivered"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.delivered_at
    }
}

/// Emitted on cancellation. `released` is the stock the caller must put back;
/// `carrier_id` is set when a carrier had already accepted the order, so the
/// surrounding system can notify them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledEvent {
    pub order_id: Uuid,
    pub released: Option<StockReservation>,
    pub carrier_id: Option<Uuid>,
    pub cancelled_at: DateTime<Utc>,
}

impl DomainEvent for OrderCancelledEvent {
    fn event_type() -> &'static str {
        "OrderCancelled"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.cancelled_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierRatedEvent {
    pub order_id: Uuid,
    pub carrier_id: Uuid,
    pub score: u8,
    pub rated_at: DateTime<Utc>,
}

impl DomainEvent for CarrierRatedEvent {
    fn event_type() -> &'static str {
        "CarrierRated"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.rated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventMetadata;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_item_snapshots_effective_price() {
        let mut product = Product::new("Plums", "Fruit", Money::new(dec!(4.00)), Quantity::kg(dec!(9)))
            .with_promotion(Money::new(dec!(4.00)), crate::money::Rate::percent(dec!(50)));
        let item = OrderItem::new(&product, Quantity::kg(dec!(1.5))).unwrap();

        product.discount_percent = None;
        product.original_price = None;

        assert_eq!(product.effective_price(), Money::new(dec!(4.00)));
        assert_eq!(item.unit_price(), Money::new(dec!(2.00)));
        assert_eq!(item.subtotal(), Money::new(dec!(3.00)));
    }

    #[test]
    fn test_set_quantity_recomputes_subtotal() {
        let product = Product::new("Kale", "Vegetables", Money::new(dec!(6.40)), Quantity::kg(dec!(9)));
        let mut item = OrderItem::new(&product, Quantity::kg(dec!(0.5))).unwrap();
        item.set_quantity(Quantity::kg(dec!(0.25))).unwrap();
        assert_eq!(item.subtotal(), Money::new(dec!(1.60)));
    }

    #[test]
    fn test_oversized_quantity_is_an_invalid_line_item() {
        let product = Product::new("Kale", "Vegetables", Money::new(dec!(6.40)), Quantity::kg(dec!(9)));
        let err = OrderItem::new(&product, Quantity::kg(rust_decimal::Decimal::MAX)).unwrap_err();
        assert!(matches!(err, OrderError::InvalidLineItem { product_id, .. } if product_id == product.id));

        let mut item = OrderItem::new(&product, Quantity::kg(dec!(0.5))).unwrap();
        assert!(item.set_quantity(Quantity::kg(rust_decimal::Decimal::MAX)).is_err());
        assert_eq!(item.quantity(), Quantity::kg(dec!(0.5)));
        assert_eq!(item.subtotal(), Money::new(dec!(3.20)));
    }

    #[test]
    fn test_event_types() {
        assert_eq!(OrderCreatedEvent::event_type(), "OrderCreated");
        assert_eq!(OrderFinalizedEvent::event_type(), "OrderFinalized");
        assert_eq!(OrderCancelledEvent::event_type(), "OrderCancelled");
        assert_eq!(CarrierRatedEvent::event_type(), "CarrierRated");
    }

    #[test]
    fn test_envelope_uses_event_time() {
        let placed_at = Utc::now();
        let (order, _) = crate::Order::create(
            Uuid::new_v4(),
            "8 Mill Street",
            crate::money::Rate::ZERO,
            placed_at,
            chrono::Duration::minutes(30),
        )
        .unwrap();
        let delivered_at = placed_at + chrono::Duration::hours(3);
        let event = OrderDeliveredEvent {
            order_id: order.id(),
            carrier_id: Uuid::new_v4(),
            delivered_at,
        };

        let envelope = event
            .to_envelope(&order, EventMetadata::for_order(order.id()))
            .unwrap();
        assert_eq!(envelope.event_type, "OrderDelivered");
        assert_eq!(envelope.timestamp, delivered_at);
        assert_eq!(envelope.sequence_number, Some(0));
        assert_eq!(envelope.payload["carrier_id"], serde_json::json!(event.carrier_id));
    }
}
