use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use common::metrics;
use domain::events::order_events::OrderFinalizedEvent;
use domain::events::{DomainEvent, EventMetadata};
use domain::inventory::StockReservation;
use domain::{Actor, CatalogSnapshot, Order, OrderAction, OrderError, Rate, Redemption};

use crate::errors::{CheckoutError, Result};
use crate::ports::{Catalog, CouponRepository, Inventory, LoyaltyTiers, OrderRepository};
use crate::step::{FinalizationStep, StepRecord};

/// A side effect that has happened and how to take it back
#[derive(Debug, Clone)]
enum Undo {
    ReleaseStock(StockReservation),
    RollbackCoupon(Redemption),
}

/// Record of the steps one finalization ran. Completed steps are undone in
/// reverse order when a later step fails.
#[derive(Debug, Clone)]
pub struct StepLog {
    order_id: Uuid,
    records: Vec<StepRecord>,
    undo: Vec<(usize, Undo)>,
}

impl StepLog {
    pub fn new(order_id: Uuid) -> Self {
        Self {
            order_id,
            records: Vec::new(),
            undo: Vec::new(),
        }
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    fn start(&mut self, step: FinalizationStep) {
        info!(order_id = %self.order_id, step = step.name(), "Executing finalization step");
        self.records.push(StepRecord::new(step));
    }

    fn complete(&mut self, undo: Option<Undo>) {
        let index = self.records.len().saturating_sub(1);
        if let Some(record) = self.records.get_mut(index) {
            record.mark_completed();
        }
        if let Some(undo) = undo {
            self.undo.push((index, undo));
        }
    }

    fn fail(&mut self, err: &CheckoutError) {
        if let Some(record) = self.records.last_mut() {
            record.mark_failed(err.to_string());
        }
    }

    /// Undo every completed step, newest first. All compensations are tried;
    /// the first one that fails is reported together with `cause`.
    async fn compensate(
        &mut self,
        inventory: &dyn Inventory,
        coupons: &dyn CouponRepository,
        cause: CheckoutError,
    ) -> CheckoutError {
        warn!(
            order_id = %self.order_id,
            error = %cause,
            steps = self.undo.len(),
            "Finalization failed, compensating completed steps"
        );

        let mut failure: Option<(&'static str, String)> = None;
        while let Some((index, undo)) = self.undo.pop() {
            let outcome = match &undo {
                Undo::ReleaseStock(reservation) => inventory.release(reservation).await,
                Undo::RollbackCoupon(redemption) => coupons.rollback(redemption).await,
            };

            let Some(record) = self.records.get_mut(index) else {
                continue;
            };
            let step = record.step.name();
            match outcome {
                Ok(()) => {
                    record.mark_compensated();
                    metrics::record_compensation(step, true);
                    info!(order_id = %self.order_id, step, "Step compensated");
                }
                Err(e) => {
                    record.mark_compensation_failed(e.to_string());
                    metrics::record_compensation(step, false);
                    error!(
                        order_id = %self.order_id,
                        step,
                        error = %e,
                        "Compensation failed for step"
                    );
                    failure.get_or_insert((step, e.to_string()));
                }
            }
        }

        match failure {
            Some((step, reason)) => CheckoutError::CompensationFailed {
                step,
                reason,
                cause: Box::new(cause),
            },
            None => cause,
        }
    }
}

/// Everything the final price depends on besides the order itself
struct PricingInputs<'a> {
    catalog: &'a CatalogSnapshot,
    redemption: Option<&'a Redemption>,
    loyalty_rate: Rate,
}

/// A successfully finalized order
#[derive(Debug, Clone)]
pub struct Finalized {
    pub order: Order,
    pub event: OrderFinalizedEvent,
    pub steps: Vec<StepRecord>,
}

/// Runs finalization: validate, reserve stock, redeem the coupon, then
/// finalize and save the order. Any failure after the first side effect is
/// compensated before the error is returned.
pub struct Finalizer {
    catalog: Arc<dyn Catalog>,
    inventory: Arc<dyn Inventory>,
    coupons: Arc<dyn CouponRepository>,
    orders: Arc<dyn OrderRepository>,
    loyalty: Arc<dyn LoyaltyTiers>,
}

impl Finalizer {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        inventory: Arc<dyn Inventory>,
        coupons: Arc<dyn CouponRepository>,
        orders: Arc<dyn OrderRepository>,
        loyalty: Arc<dyn LoyaltyTiers>,
    ) -> Self {
        Self {
            catalog,
            inventory,
            coupons,
            orders,
            loyalty,
        }
    }

    pub async fn finalize(&self, order: Order, actor: &Actor, now: DateTime<Utc>) -> Result<Finalized> {
        let started = Instant::now();
        let result = self.run(order, actor, now).await;
        metrics::record_finalization(result.is_ok(), started.elapsed().as_secs_f64());
        result
    }

    async fn run(&self, mut order: Order, actor: &Actor, now: DateTime<Utc>) -> Result<Finalized> {
        actor.authorize(OrderAction::Finalize, &order)?;
        let expected_version = order.version();

        // Checks with no side effects come first
        let product_ids: Vec<Uuid> = order.items().iter().map(|i| i.product_id()).collect();
        let catalog = self.catalog.snapshot(&product_ids).await?;
        order.validate_for_finalization(&catalog)?;
        let loyalty_rate = self.loyalty.loyalty_rate(order.customer_id()).await?;

        let mut log = StepLog::new(order.id());

        log.start(FinalizationStep::ReserveStock);
        let reservation = match self
            .inventory
            .reserve(order.id(), order.reservation_lines())
            .await
        {
            Ok(reservation) => reservation,
            Err(e) => {
                if let CheckoutError::Order(OrderError::InsufficientStock {
                    product_id,
                    requested,
                    available,
                }) = &e
                {
                    metrics::record_stock_rejection();
                    warn!(
                        order_id = %order.id(),
                        product_id = %product_id,
                        requested = %requested,
                        available = %available,
                        "Not enough stock to finalize order"
                    );
                }
                log.fail(&e);
                return Err(log.compensate(&*self.inventory, &*self.coupons, e).await);
            }
        };
        log.complete(Some(Undo::ReleaseStock(reservation.clone())));

        let redemption = match order.coupon_code() {
            Some(code) => {
                log.start(FinalizationStep::RedeemCoupon);
                match self
                    .coupons
                    .resolve(code, order.customer_id(), order.subtotal(), now)
                    .await
                {
                    Ok(redemption) => {
                        log.complete(Some(Undo::RollbackCoupon(redemption.clone())));
                        Some(redemption)
                    }
                    Err(e) => {
                        log.fail(&e);
                        return Err(log.compensate(&*self.inventory, &*self.coupons, e).await);
                    }
                }
            }
            None => None,
        };

        log.start(FinalizationStep::SaveOrder);
        let pricing_inputs = PricingInputs {
            catalog: &catalog,
            redemption: redemption.as_ref(),
            loyalty_rate,
        };
        let saved = self
            .finalize_and_save(&mut order, actor, pricing_inputs, reservation.clone(), expected_version, now)
            .await;
        let event = match saved {
            Ok(event) => event,
            Err(e) => {
                log.fail(&e);
                return Err(log.compensate(&*self.inventory, &*self.coupons, e).await);
            }
        };
        log.complete(None);

        self.warn_low_stock(&reservation).await;

        info!(
            order_id = %order.id(),
            customer_id = %order.customer_id(),
            total_cost = %order.total_cost(),
            "Order finalized"
        );

        Ok(Finalized {
            order,
            event,
            steps: log.records().to_vec(),
        })
    }

    async fn finalize_and_save(
        &self,
        order: &mut Order,
        actor: &Actor,
        inputs: PricingInputs<'_>,
        reservation: StockReservation,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<OrderFinalizedEvent> {
        let event = order.finalize(
            inputs.catalog,
            inputs.redemption,
            inputs.loyalty_rate,
            reservation,
            now,
        )?;
        let envelope = event.to_envelope(order, EventMetadata::for_order(order.id()).by(actor))?;
        self.orders
            .save_order(order, Some(expected_version), vec![envelope])
            .await?;
        Ok(event)
    }

    async fn warn_low_stock(&self, reservation: &StockReservation) {
        match self.inventory.low_stock(reservation).await {
            Ok(low) => {
                for (product_id, available) in low {
                    metrics::record_low_stock();
                    warn!(
                        product_id = %product_id,
                        available = %available,
                        "Product at or below restock threshold"
                    );
                }
            }
            Err(e) => {
                warn!(order_id = %reservation.order_id, error = %e, "Could not check stock levels");
            }
        }
    }
}
