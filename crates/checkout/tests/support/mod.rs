#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use checkout::{
    CheckoutError, InMemoryCoupons, InMemoryInventory, InMemoryOrders, Inventory, OrderRepository,
    OrderService, Ports, Result,
};
use common::EngineConfig;
use domain::commands::order_commands::{PlaceOrderCommand, PlaceOrderItem};
use domain::events::EventEnvelope;
use domain::inventory::StockReservation;
use domain::{Actor, FixedClock, LoyaltySchedule, Money, Order, Product, Quantity};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 10, 0, 0).unwrap()
}

/// Order repository whose saves of finalized orders can be made to fail
pub struct FlakyOrders {
    inner: Arc<InMemoryOrders>,
    fail_finalized_saves: AtomicBool,
}

impl FlakyOrders {
    pub fn new(inner: Arc<InMemoryOrders>) -> Self {
        Self {
            inner,
            fail_finalized_saves: AtomicBool::new(false),
        }
    }

    pub fn fail_finalized_saves(&self) {
        self.fail_finalized_saves.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl OrderRepository for FlakyOrders {
    async fn load_order(&self, order_id: Uuid) -> Result<Order> {
        self.inner.load_order(order_id).await
    }

    async fn save_order(
        &self,
        order: &Order,
        expected_version: Option<i64>,
        events: Vec<EventEnvelope>,
    ) -> Result<()> {
        if order.is_finalized() && self.fail_finalized_saves.load(Ordering::SeqCst) {
            return Err(CheckoutError::ConcurrencyConflict {
                order_id: order.id(),
                expected: expected_version,
                actual: expected_version.map(|v| v + 1),
            });
        }
        self.inner.save_order(order, expected_version, events).await
    }

    async fn history(&self, order_id: Uuid) -> Result<Vec<EventEnvelope>> {
        self.inner.history(order_id).await
    }

    async fn delivered_count(&self, customer_id: Uuid) -> Result<u32> {
        self.inner.delivered_count(customer_id).await
    }
}

/// Inventory whose releases can be made to fail
pub struct FlakyInventory {
    inner: Arc<InMemoryInventory>,
    fail_releases: AtomicBool,
}

impl FlakyInventory {
    pub fn new(inner: Arc<InMemoryInventory>) -> Self {
        Self {
            inner,
            fail_releases: AtomicBool::new(false),
        }
    }

    pub fn fail_releases(&self, fail: bool) {
        self.fail_releases.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Inventory for FlakyInventory {
    async fn reserve(&self, order_id: Uuid, lines: Vec<(Uuid, Quantity)>) -> Result<StockReservation> {
        self.inner.reserve(order_id, lines).await
    }

    async fn release(&self, reservation: &StockReservation) -> Result<()> {
        if self.fail_releases.load(Ordering::SeqCst) {
            let product_id = reservation.lines.first().map(|l| l.product_id).unwrap_or_default();
            return Err(domain::OrderError::ProductNotFound(product_id).into());
        }
        self.inner.release(reservation).await
    }

    async fn low_stock(&self, reservation: &StockReservation) -> Result<Vec<(Uuid, Quantity)>> {
        self.inner.low_stock(reservation).await
    }
}

pub struct World {
    pub service: Arc<OrderService>,
    pub inventory: Arc<InMemoryInventory>,
    pub coupons: Arc<InMemoryCoupons>,
    pub orders: Arc<InMemoryOrders>,
    pub flaky: Arc<FlakyOrders>,
    pub flaky_inventory: Arc<FlakyInventory>,
    pub clock: Arc<FixedClock>,
    pub customer: Actor,
    pub owner: Actor,
}

impl World {
    pub fn new(schedule: LoyaltySchedule) -> Self {
        common::telemetry::init_basic_telemetry("warn");

        let inventory = Arc::new(InMemoryInventory::new());
        let coupons = Arc::new(InMemoryCoupons::new());
        let orders = Arc::new(InMemoryOrders::new());
        let flaky = Arc::new(FlakyOrders::new(orders.clone()));
        let flaky_inventory = Arc::new(FlakyInventory::new(inventory.clone()));
        let clock = Arc::new(FixedClock::at(start()));

        let mut ports = Ports::in_memory(inventory.clone(), coupons.clone(), orders.clone(), schedule);
        ports.orders = flaky.clone();
        ports.inventory = flaky_inventory.clone();

        let service = OrderService::new(ports, clock.clone(), &EngineConfig::default())
            .expect("default config is valid");

        Self {
            service: Arc::new(service),
            inventory,
            coupons,
            orders,
            flaky,
            flaky_inventory,
            clock,
            customer: Actor::customer(Uuid::new_v4()),
            owner: Actor::owner(Uuid::new_v4()),
        }
    }

    pub fn plain() -> Self {
        Self::new(LoyaltySchedule::default())
    }

    pub async fn stock(&self, name: &str, price: Decimal, kg: Decimal) -> Product {
        let product = Product::new(name, "Produce", Money::new(price), Quantity::kg(kg));
        self.inventory.add_product(product.clone()).await;
        product
    }

    pub async fn place(&self, lines: &[(Uuid, Decimal)], coupon_code: Option<&str>) -> Order {
        self.place_for(&self.customer, lines, coupon_code).await
    }

    pub async fn place_for(
        &self,
        customer: &Actor,
        lines: &[(Uuid, Decimal)],
        coupon_code: Option<&str>,
    ) -> Order {
        self.service
            .place_order(
                customer,
                PlaceOrderCommand {
                    customer_id: customer.id,
                    delivery_address: "27 Harbour Road".to_string(),
                    items: lines
                        .iter()
                        .map(|&(product_id, kg)| PlaceOrderItem {
                            product_id,
                            quantity: Quantity::kg(kg),
                        })
                        .collect(),
                    coupon_code: coupon_code.map(str::to_string),
                },
            )
            .await
            .expect("order is placed")
    }

    pub async fn available(&self, product_id: Uuid) -> Quantity {
        self.inventory
            .available(product_id)
            .await
            .expect("product is tracked")
    }
}

pub fn assert_total_identity(order: &Order) {
    assert_eq!(
        order.total_cost(),
        order.subtotal() + order.vat_amount() - order.discount_amount() - order.loyalty_discount()
    );
    assert!(!order.total_cost().is_negative());
}
