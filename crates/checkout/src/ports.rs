use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::events::EventEnvelope;
use domain::inventory::StockReservation;
use domain::{CarrierRating, CatalogSnapshot, Money, Order, Product, Quantity, Rate, Redemption};
use uuid::Uuid;

use crate::errors::Result;

/// Read access to the product catalog
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Snapshot of the given products as they are right now. Unknown ids are
    /// left out; the pricing checks report them.
    async fn snapshot(&self, product_ids: &[Uuid]) -> Result<CatalogSnapshot>;

    async fn get_product(&self, product_id: Uuid) -> Result<Product>;
}

/// Stock levels, shared by every order
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Reserve all lines or none of them
    async fn reserve(&self, order_id: Uuid, lines: Vec<(Uuid, Quantity)>) -> Result<StockReservation>;

    /// Put a reservation back
    async fn release(&self, reservation: &StockReservation) -> Result<()>;

    /// Products of the reservation now at or under their restock threshold
    async fn low_stock(&self, reservation: &StockReservation) -> Result<Vec<(Uuid, Quantity)>>;
}

/// Coupon storage with single-use redemption
#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// Check a code without redeeming it
    async fn evaluate(
        &self,
        code: &str,
        customer_id: Uuid,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Redemption>;

    /// Check a code and mark it used, atomically
    async fn resolve(
        &self,
        code: &str,
        customer_id: Uuid,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Redemption>;

    /// Undo a [`CouponRepository::resolve`]
    async fn rollback(&self, redemption: &Redemption) -> Result<()>;
}

/// Order persistence with optimistic concurrency
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn load_order(&self, order_id: Uuid) -> Result<Order>;

    /// Store the order and append its events. `expected_version` is the
    /// version the order had when it was loaded, `None` for a new order.
    async fn save_order(
        &self,
        order: &Order,
        expected_version: Option<i64>,
        events: Vec<EventEnvelope>,
    ) -> Result<()>;

    /// Events of one order, oldest first
    async fn history(&self, order_id: Uuid) -> Result<Vec<EventEnvelope>>;

    async fn delivered_count(&self, customer_id: Uuid) -> Result<u32>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    async fn rating_for(&self, order_id: Uuid) -> Result<Option<CarrierRating>>;

    /// Store a rating; a second rating for the same order fails with
    /// `AlreadyRated`
    async fn save_rating(&self, rating: &CarrierRating, event: EventEnvelope) -> Result<()>;
}

/// Loyalty discount a customer earns
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoyaltyTiers: Send + Sync {
    async fn loyalty_rate(&self, customer_id: Uuid) -> Result<Rate>;
}

/// Whether a carrier can take one more order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CarrierCapacity: Send + Sync {
    async fn has_capacity(&self, carrier_id: Uuid) -> Result<bool>;
}
