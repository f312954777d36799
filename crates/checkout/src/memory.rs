//! In-process adapters for every port. Each one guards its state with a
//! single tokio lock, so a check and the write that depends on it can never
//! interleave with another request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use domain::events::EventEnvelope;
use domain::inventory::StockReservation;
use domain::{
    CarrierRating, CatalogSnapshot, Coupon, CouponBook, LoyaltySchedule, Money, Order, OrderError,
    OrderStatus, Product, Quantity, Rate, Redemption, StockLedger,
};

use crate::errors::{CheckoutError, Result};
use crate::ports::{
    CarrierCapacity, Catalog, CouponRepository, Inventory, LoyaltyTiers, OrderRepository,
    RatingRepository,
};

/// Product catalog and stock ledger in one place
#[derive(Default)]
pub struct InMemoryInventory {
    products: RwLock<HashMap<Uuid, Product>>,
    ledger: Mutex<StockLedger>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// List a product and start tracking its stock
    pub async fn add_product(&self, product: Product) {
        self.ledger.lock().await.track(&product);
        self.products.write().await.insert(product.id, product);
    }

    /// Change catalog data such as the price. Stock levels are untouched.
    pub async fn update_product(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        let slot = products
            .get_mut(&product.id)
            .ok_or(OrderError::ProductNotFound(product.id))?;
        *slot = product;
        Ok(())
    }

    pub async fn restock(&self, product_id: Uuid, quantity: Quantity) -> Result<Quantity> {
        Ok(self.ledger.lock().await.restock(product_id, quantity)?)
    }

    pub async fn available(&self, product_id: Uuid) -> Option<Quantity> {
        self.ledger.lock().await.available(product_id)
    }
}

impl InMemoryInventory {
    /// Overwrite the listed stock with the ledger's current level
    async fn with_live_stock(&self, mut products: Vec<Product>) -> Vec<Product> {
        let ledger = self.ledger.lock().await;
        for product in &mut products {
            if let Some(available) = ledger.available(product.id) {
                product.stock = available;
            }
        }
        products
    }
}

#[async_trait]
impl Catalog for InMemoryInventory {
    async fn snapshot(&self, product_ids: &[Uuid]) -> Result<CatalogSnapshot> {
        let listed: Vec<Product> = {
            let products = self.products.read().await;
            product_ids.iter().filter_map(|id| products.get(id).cloned()).collect()
        };
        Ok(CatalogSnapshot::new(self.with_live_stock(listed).await))
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Product> {
        let mut product = self
            .products
            .read()
            .await
            .get(&product_id)
            .cloned()
            .ok_or(OrderError::ProductNotFound(product_id))?;
        if let Some(available) = self.available(product_id).await {
            product.stock = available;
        }
        Ok(product)
    }
}

#[async_trait]
impl Inventory for InMemoryInventory {
    async fn reserve(&self, order_id: Uuid, lines: Vec<(Uuid, Quantity)>) -> Result<StockReservation> {
        let reservation = self.ledger.lock().await.reserve(order_id, lines)?;
        debug!(order_id = %order_id, lines = reservation.lines.len(), "Stock reserved");
        Ok(reservation)
    }

    async fn release(&self, reservation: &StockReservation) -> Result<()> {
        self.ledger.lock().await.release(reservation)?;
        debug!(order_id = %reservation.order_id, "Stock released");
        Ok(())
    }

    async fn low_stock(&self, reservation: &StockReservation) -> Result<Vec<(Uuid, Quantity)>> {
        Ok(self.ledger.lock().await.below_threshold(reservation))
    }
}

#[derive(Default)]
pub struct InMemoryCoupons {
    book: Mutex<CouponBook>,
}

impl InMemoryCoupons {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_coupon(&self, coupon: Coupon) {
        self.book.lock().await.insert(coupon);
    }

    pub async fn coupon(&self, code: &str) -> Option<Coupon> {
        self.book.lock().await.get(code).cloned()
    }
}

#[async_trait]
impl CouponRepository for InMemoryCoupons {
    async fn evaluate(
        &self,
        code: &str,
        customer_id: Uuid,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        Ok(self.book.lock().await.evaluate(code, customer_id, subtotal, now)?)
    }

    async fn resolve(
        &self,
        code: &str,
        customer_id: Uuid,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<Redemption> {
        Ok(self.book.lock().await.resolve(code, customer_id, subtotal, now)?)
    }

    async fn rollback(&self, redemption: &Redemption) -> Result<()> {
        Ok(self.book.lock().await.rollback(redemption)?)
    }
}

#[derive(Default)]
struct OrderStore {
    orders: HashMap<Uuid, Order>,
    events: HashMap<Uuid, Vec<EventEnvelope>>,
    ratings: HashMap<Uuid, CarrierRating>,
}

/// Orders, their event history and carrier ratings
#[derive(Default)]
pub struct InMemoryOrders {
    store: Mutex<OrderStore>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.store
            .lock()
            .await
            .orders
            .get(&order_id)
            .cloned()
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    async fn save_order(
        &self,
        order: &Order,
        expected_version: Option<i64>,
        events: Vec<EventEnvelope>,
    ) -> Result<()> {
        let mut store = self.store.lock().await;

        let actual = store.orders.get(&order.id()).map(Order::version);
        if actual != expected_version {
            return Err(CheckoutError::ConcurrencyConflict {
                order_id: order.id(),
                expected: expected_version,
                actual,
            });
        }

        store.orders.insert(order.id(), order.clone());
        store.events.entry(order.id()).or_default().extend(events);
        Ok(())
    }

    async fn history(&self, order_id: Uuid) -> Result<Vec<EventEnvelope>> {
        let store = self.store.lock().await;
        if !store.orders.contains_key(&order_id) {
            return Err(CheckoutError::OrderNotFound(order_id));
        }
        Ok(store.events.get(&order_id).cloned().unwrap_or_default())
    }

    async fn delivered_count(&self, customer_id: Uuid) -> Result<u32> {
        let store = self.store.lock().await;
        let count = store
            .orders
            .values()
            .filter(|o| o.customer_id() == customer_id && o.status() == OrderStatus::Delivered)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl RatingRepository for InMemoryOrders {
    async fn rating_for(&self, order_id: Uuid) -> Result<Option<CarrierRating>> {
        Ok(self.store.lock().await.ratings.get(&order_id).cloned())
    }

    async fn save_rating(&self, rating: &CarrierRating, event: EventEnvelope) -> Result<()> {
        let mut store = self.store.lock().await;
        if store.ratings.contains_key(&rating.order_id) {
            return Err(OrderError::AlreadyRated(rating.order_id).into());
        }
        store.ratings.insert(rating.order_id, rating.clone());
        store.events.entry(rating.order_id).or_default().push(event);
        Ok(())
    }
}

/// Loyalty rate from the tier schedule and the customer's delivered orders
pub struct ScheduledLoyalty {
    schedule: LoyaltySchedule,
    orders: Arc<dyn OrderRepository>,
}

impl ScheduledLoyalty {
    pub fn new(schedule: LoyaltySchedule, orders: Arc<dyn OrderRepository>) -> Self {
        Self { schedule, orders }
    }
}

#[async_trait]
impl LoyaltyTiers for ScheduledLoyalty {
    async fn loyalty_rate(&self, customer_id: Uuid) -> Result<Rate> {
        let delivered = self.orders.delivered_count(customer_id).await?;
        Ok(self.schedule.rate_for(delivered))
    }
}

/// Every carrier can always take another order
pub struct UnlimitedCapacity;

#[async_trait]
impl CarrierCapacity for UnlimitedCapacity {
    async fn has_capacity(&self, _carrier_id: Uuid) -> Result<bool> {
        Ok(true)
    }
}
