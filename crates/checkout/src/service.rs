use chrono::Duration;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::Validate;

use common::{metrics, EngineConfig};
use domain::commands::order_commands::{
    AssignCarrierCommand, CancelOrderCommand, PlaceOrderCommand, RateCarrierCommand,
};
use domain::events::{DomainEvent, EventEnvelope, EventMetadata};
use domain::{
    Actor, CarrierRating, Clock, LifecycleEvent, LoyaltySchedule, LoyaltyTier, Order, OrderAction,
    OrderError, OrderStatus, PriceBreakdown, Quantity, Rate, Role,
};

use crate::errors::{CheckoutError, Result};
use crate::finalization::Finalizer;
use crate::memory::{InMemoryCoupons, InMemoryInventory, InMemoryOrders, ScheduledLoyalty, UnlimitedCapacity};
use crate::ports::{
    CarrierCapacity, Catalog, CouponRepository, Inventory, LoyaltyTiers, OrderRepository,
    RatingRepository,
};

/// The collaborators the service talks to
#[derive(Clone)]
pub struct Ports {
    pub catalog: Arc<dyn Catalog>,
    pub inventory: Arc<dyn Inventory>,
    pub coupons: Arc<dyn CouponRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub ratings: Arc<dyn RatingRepository>,
    pub loyalty: Arc<dyn LoyaltyTiers>,
    pub capacity: Arc<dyn CarrierCapacity>,
}

impl Ports {
    /// Wire the in-memory adapters together. Carriers have unlimited
    /// capacity.
    pub fn in_memory(
        inventory: Arc<InMemoryInventory>,
        coupons: Arc<InMemoryCoupons>,
        orders: Arc<InMemoryOrders>,
        schedule: LoyaltySchedule,
    ) -> Self {
        Self {
            catalog: inventory.clone(),
            inventory,
            coupons,
            orders: orders.clone(),
            ratings: orders.clone(),
            loyalty: Arc::new(ScheduledLoyalty::new(schedule, orders)),
            capacity: Arc::new(UnlimitedCapacity),
        }
    }
}

/// Convert configured loyalty tiers into a schedule
pub fn loyalty_schedule(config: &EngineConfig) -> Result<LoyaltySchedule> {
    let tiers = config
        .loyalty_tiers
        .iter()
        .map(|t| LoyaltyTier {
            min_delivered_orders: t.min_delivered_orders,
            rate: Rate::percent(t.percent),
        })
        .collect();
    Ok(LoyaltySchedule::new(tiers)?)
}

/// Entry point for every order operation. Each call loads the order,
/// checks the caller's capability, applies the change through the aggregate
/// and saves it against the version it was loaded at.
pub struct OrderService {
    ports: Ports,
    finalizer: Finalizer,
    clock: Arc<dyn Clock>,
    vat_rate: Rate,
    grace: Duration,
}

impl OrderService {
    pub fn new(ports: Ports, clock: Arc<dyn Clock>, config: &EngineConfig) -> Result<Self> {
        config.validate()?;

        let finalizer = Finalizer::new(
            ports.catalog.clone(),
            ports.inventory.clone(),
            ports.coupons.clone(),
            ports.orders.clone(),
            ports.loyalty.clone(),
        );

        info!(
            vat_rate = %config.vat_rate,
            cancellation_grace_minutes = config.cancellation_grace_minutes,
            "Order service ready"
        );

        Ok(Self {
            ports,
            finalizer,
            clock,
            vat_rate: Rate::from_fraction(config.vat_rate),
            grace: Duration::minutes(config.cancellation_grace_minutes),
        })
    }

    pub async fn place_order(&self, actor: &Actor, cmd: PlaceOrderCommand) -> Result<Order> {
        measured("place_order", async {
            cmd.validate().map_err(OrderError::from)?;
            if actor.role != Role::Customer || actor.id != cmd.customer_id {
                return Err(OrderError::Forbidden {
                    actor_id: actor.id,
                    action: "place an order for this customer",
                }
                .into());
            }

            let now = self.clock.now();
            let (mut order, created) = Order::create(
                cmd.customer_id,
                cmd.delivery_address,
                self.vat_rate,
                now,
                self.grace,
            )?;

            for item in &cmd.items {
                let product = self.ports.catalog.get_product(item.product_id).await?;
                order.add_item(&product, item.quantity)?;
            }
            if let Some(code) = cmd.coupon_code {
                order.apply_coupon_code(code)?;
            }

            let envelope = self.envelope(&order, actor, &created)?;
            self.ports.orders.save_order(&order, None, vec![envelope]).await?;

            info!(
                order_id = %order.id(),
                customer_id = %order.customer_id(),
                items = order.items().len(),
                subtotal = %order.subtotal(),
                "Order placed"
            );
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    pub async fn add_item(
        &self,
        actor: &Actor,
        order_id: Uuid,
        product_id: Uuid,
        quantity: Quantity,
    ) -> Result<Order> {
        measured("add_item", async {
            let (mut order, version) = self.load_for(actor, OrderAction::EditItems, order_id).await?;
            let product = self.ports.catalog.get_product(product_id).await?;
            order.add_item(&product, quantity)?;
            self.ports.orders.save_order(&order, Some(version), vec![]).await?;

            info!(order_id = %order_id, product_id = %product_id, quantity = %quantity, "Item added");
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    pub async fn update_quantity(
        &self,
        actor: &Actor,
        order_id: Uuid,
        product_id: Uuid,
        quantity: Quantity,
    ) -> Result<Order> {
        measured("update_quantity", async {
            let (mut order, version) = self.load_for(actor, OrderAction::EditItems, order_id).await?;
            order.update_quantity(product_id, quantity)?;
            self.ports.orders.save_order(&order, Some(version), vec![]).await?;

            info!(order_id = %order_id, product_id = %product_id, quantity = %quantity, "Quantity updated");
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    pub async fn remove_item(&self, actor: &Actor, order_id: Uuid, product_id: Uuid) -> Result<Order> {
        measured("remove_item", async {
            let (mut order, version) = self.load_for(actor, OrderAction::EditItems, order_id).await?;
            order.remove_item(product_id)?;
            self.ports.orders.save_order(&order, Some(version), vec![]).await?;

            info!(order_id = %order_id, product_id = %product_id, "Item removed");
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    /// Attach a coupon code after checking it can currently be redeemed.
    /// The coupon is only marked used when the order is finalized. Returns
    /// the price the order would have with it.
    pub async fn apply_coupon(&self, actor: &Actor, order_id: Uuid, code: &str) -> Result<PriceBreakdown> {
        measured("apply_coupon", async {
            let (mut order, version) = self.load_for(actor, OrderAction::EditItems, order_id).await?;
            let redemption = self
                .ports
                .coupons
                .evaluate(code, order.customer_id(), order.subtotal(), self.clock.now())
                .await?;
            order.apply_coupon_code(code)?;

            let loyalty_rate = self.ports.loyalty.loyalty_rate(order.customer_id()).await?;
            let quote = order.quote(Some(&redemption.effect), loyalty_rate)?;
            self.ports.orders.save_order(&order, Some(version), vec![]).await?;

            info!(
                order_id = %order_id,
                code,
                discount = %quote.discount_amount,
                "Coupon applied"
            );
            Ok::<_, CheckoutError>(quote)
        })
        .await
    }

    pub async fn clear_coupon(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        measured("clear_coupon", async {
            let (mut order, version) = self.load_for(actor, OrderAction::EditItems, order_id).await?;
            order.clear_coupon_code()?;
            self.ports.orders.save_order(&order, Some(version), vec![]).await?;
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    /// Current price. A finalized order reports its persisted breakdown; an
    /// open one is priced with its coupon and the customer's loyalty rate as
    /// they stand now.
    pub async fn quote(&self, actor: &Actor, order_id: Uuid) -> Result<PriceBreakdown> {
        measured("quote", async {
            let (order, _) = self.load_for(actor, OrderAction::View, order_id).await?;
            if order.is_finalized() {
                return Ok(*order.pricing());
            }

            let loyalty_rate = self.ports.loyalty.loyalty_rate(order.customer_id()).await?;
            let coupon = match order.coupon_code() {
                Some(code) => Some(
                    self.ports
                        .coupons
                        .evaluate(code, order.customer_id(), order.subtotal(), self.clock.now())
                        .await?
                        .effect,
                ),
                None => None,
            };
            Ok::<_, CheckoutError>(order.quote(coupon.as_ref(), loyalty_rate)?)
        })
        .await
    }

    pub async fn finalize(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        measured("finalize", async {
            let order = self.ports.orders.load_order(order_id).await?;
            let finalized = self.finalizer.finalize(order, actor, self.clock.now()).await?;
            Ok::<_, CheckoutError>(finalized.order)
        })
        .await
    }

    pub async fn assign_carrier(&self, actor: &Actor, cmd: AssignCarrierCommand) -> Result<Order> {
        measured("assign_carrier", async {
            let (mut order, version) = self
                .load_for(actor, OrderAction::AssignCarrier(cmd.carrier_id), cmd.order_id)
                .await?;

            // Illegal transitions are reported before capacity is consulted
            order.status().transition(LifecycleEvent::AssignCarrier)?;
            if !self.ports.capacity.has_capacity(cmd.carrier_id).await? {
                return Err(OrderError::CarrierUnavailable(cmd.carrier_id).into());
            }

            let event = order.assign_carrier(cmd.carrier_id, self.clock.now())?;
            self.save_with_event(&order, version, actor, &event).await?;

            info!(order_id = %order.id(), carrier_id = %cmd.carrier_id, "Carrier assigned");
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    pub async fn start_transit(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        measured("start_transit", async {
            let (mut order, version) = self.load_for(actor, OrderAction::StartTransit, order_id).await?;
            let event = order.start_transit(self.clock.now())?;
            self.save_with_event(&order, version, actor, &event).await?;

            info!(order_id = %order_id, carrier_id = %event.carrier_id, "Transit started");
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    pub async fn mark_delivered(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        measured("mark_delivered", async {
            let (mut order, version) = self.load_for(actor, OrderAction::MarkDelivered, order_id).await?;
            let event = order.mark_delivered(self.clock.now())?;
            self.save_with_event(&order, version, actor, &event).await?;

            info!(order_id = %order_id, carrier_id = %event.carrier_id, "Order delivered");
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    /// Cancel within the grace window. The status change is saved first,
    /// then any reserved stock goes back to the inventory. If that fails the
    /// order keeps its reservation and `release_cancelled_stock` can retry.
    pub async fn cancel(&self, actor: &Actor, cmd: CancelOrderCommand) -> Result<Order> {
        measured("cancel", async {
            let (mut order, version) = self.load_for(actor, OrderAction::Cancel, cmd.order_id).await?;
            let event = order.cancel(self.clock.now())?;
            self.save_with_event(&order, version, actor, &event).await?;

            info!(order_id = %cmd.order_id, customer_id = %order.customer_id(), "Order cancelled");
            if let Some(carrier_id) = event.carrier_id {
                info!(order_id = %cmd.order_id, carrier_id = %carrier_id, "Assigned carrier released by cancellation");
            }

            self.release_held_stock(&mut order).await?;
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    /// Hand back stock a cancelled order still holds. A no-op once the stock
    /// has been released.
    pub async fn release_cancelled_stock(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        measured("release_cancelled_stock", async {
            let (mut order, _) = self.load_for(actor, OrderAction::Cancel, order_id).await?;
            if order.status() != OrderStatus::Cancelled {
                return Err(OrderError::IllegalTransition {
                    current: order.status(),
                    event: LifecycleEvent::Cancel,
                }
                .into());
            }

            self.release_held_stock(&mut order).await?;
            Ok::<_, CheckoutError>(order)
        })
        .await
    }

    /// The reservation is detached and saved before the inventory call, so
    /// only one caller can hand it back. A failed release puts it back on
    /// the order.
    async fn release_held_stock(&self, order: &mut Order) -> Result<()> {
        let expected = order.version();
        let Some(reservation) = order.take_released_stock() else {
            return Ok(());
        };
        self.ports
            .orders
            .save_order(order, Some(expected), Vec::new())
            .await?;

        if let Err(e) = self.ports.inventory.release(&reservation).await {
            error!(
                order_id = %order.id(),
                error = %e,
                "Order cancelled but its stock could not be released"
            );
            let detached = order.version();
            order.restore_unreleased_stock(reservation)?;
            if let Err(save_err) = self
                .ports
                .orders
                .save_order(order, Some(detached), Vec::new())
                .await
            {
                error!(
                    order_id = %order.id(),
                    error = %save_err,
                    "Could not record unreleased stock on cancelled order"
                );
            }
            return Err(e);
        }

        debug!(order_id = %order.id(), lines = reservation.lines.len(), "Cancelled order stock released");
        Ok(())
    }

    pub async fn rate_carrier(&self, actor: &Actor, cmd: RateCarrierCommand) -> Result<CarrierRating> {
        measured("rate_carrier", async {
            cmd.validate().map_err(OrderError::from)?;
            let order = self.ports.orders.load_order(cmd.order_id).await?;
            if self.ports.ratings.rating_for(cmd.order_id).await?.is_some() {
                return Err(OrderError::AlreadyRated(cmd.order_id).into());
            }

            let (rating, event) =
                CarrierRating::for_order(&order, actor, cmd.score, cmd.comment, self.clock.now())?;
            let envelope = self.envelope(&order, actor, &event)?;
            self.ports.ratings.save_rating(&rating, envelope).await?;

            info!(
                order_id = %cmd.order_id,
                carrier_id = %rating.carrier_id,
                score = rating.score,
                "Carrier rated"
            );
            Ok::<_, CheckoutError>(rating)
        })
        .await
    }

    pub async fn order(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        measured("order", async {
            Ok::<_, CheckoutError>(self.load_for(actor, OrderAction::View, order_id).await?.0)
        })
        .await
    }

    /// Every event recorded for the order, oldest first
    pub async fn history(&self, actor: &Actor, order_id: Uuid) -> Result<Vec<EventEnvelope>> {
        measured("history", async {
            self.load_for(actor, OrderAction::View, order_id).await?;
            self.ports.orders.history(order_id).await
        })
        .await
    }

    async fn load_for(&self, actor: &Actor, action: OrderAction, order_id: Uuid) -> Result<(Order, i64)> {
        let order = self.ports.orders.load_order(order_id).await?;
        actor.authorize(action, &order)?;
        let version = order.version();
        Ok((order, version))
    }

    fn envelope<E: DomainEvent>(&self, order: &Order, actor: &Actor, event: &E) -> Result<EventEnvelope> {
        Ok(event.to_envelope(order, EventMetadata::for_order(order.id()).by(actor))?)
    }

    async fn save_with_event<E: DomainEvent>(
        &self,
        order: &Order,
        expected_version: i64,
        actor: &Actor,
        event: &E,
    ) -> Result<()> {
        let envelope = self.envelope(order, actor, event)?;
        self.ports
            .orders
            .save_order(order, Some(expected_version), vec![envelope])
            .await
    }
}

/// Time a command and count it by outcome
async fn measured<T, F>(command: &'static str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let result = operation.await;

    let status = match &result {
        Ok(_) => "success",
        Err(e) => {
            warn!(command, error = %e, kind = e.kind(), "Order command failed");
            e.kind()
        }
    };
    metrics::record_command(command, status, started.elapsed().as_secs_f64());

    result
}
