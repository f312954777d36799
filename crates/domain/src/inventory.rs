use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::catalog::Product;
use crate::errors::OrderError;
use crate::money::Quantity;

/// Stock taken out of the ledger for one order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StockReservation {
    pub order_id: Uuid,
    pub lines: Vec<ReservedLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservedLine {
    pub product_id: Uuid,
    pub quantity: Quantity,
}

impl StockReservation {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn quantity_of(&self, product_id: Uuid) -> Quantity {
        self.lines
            .iter()
            .filter(|l| l.product_id == product_id)
            .fold(Quantity::ZERO, |acc, l| acc + l.quantity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StockEntry {
    available: Quantity,
    restock_threshold: Quantity,
}

/// Available stock per product.
#[derive(Debug, Clone, Default)]
pub struct StockLedger {
    entries: HashMap<Uuid, StockEntry>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_products<'a>(products: impl IntoIterator<Item = &'a Product>) -> Self {
        let mut ledger = Self::new();
        for product in products {
            ledger.track(product);
        }
        ledger
    }

    /// Start tracking a product, replacing any previous level.
    pub fn track(&mut self, product: &Product) {
        self.entries.insert(
            product.id,
            StockEntry {
                available: product.stock,
                restock_threshold: product.restock_threshold,
            },
        );
    }

    pub fn available(&self, product_id: Uuid) -> Option<Quantity> {
        self.entries.get(&product_id).map(|e| e.available)
    }

    pub fn restock(&mut self, product_id: Uuid, quantity: Quantity) -> Result<Quantity, OrderError> {
        let entry = self
            .entries
            .get_mut(&product_id)
            .ok_or(OrderError::ProductNotFound(product_id))?;
        entry.available = entry
            .available
            .checked_add(quantity)
            .ok_or_else(|| OrderError::InvalidLineItem {
                product_id,
                reason: format!("restocking {} would overflow the stock level", quantity),
            })?;
        Ok(entry.available)
    }

    /// Decrement stock for every line, or for none of them.
    ///
    /// Lines for the same product are merged before checking, so an order
    /// cannot sneak past the check by splitting a quantity.
    pub fn reserve(
        &mut self,
        order_id: Uuid,
        lines: impl IntoIterator<Item = (Uuid, Quantity)>,
    ) -> Result<StockReservation, OrderError> {
        let mut requested: BTreeMap<Uuid, Quantity> = BTreeMap::new();
        for (product_id, quantity) in lines {
            if !quantity.is_positive() {
                return Err(OrderError::InvalidLineItem {
                    product_id,
                    reason: format!("quantity must be positive, got {}", quantity),
                });
            }
            let total = requested.entry(product_id).or_insert(Quantity::ZERO);
            *total = total
                .checked_add(quantity)
                .ok_or_else(|| OrderError::InvalidLineItem {
                    product_id,
                    reason: "requested quantity is out of range".to_string(),
                })?;
        }

        if requested.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        for (&product_id, &quantity) in &requested {
            let entry = self
                .entries
                .get(&product_id)
                .ok_or(OrderError::ProductNotFound(product_id))?;
            if entry.available < quantity {
                return Err(OrderError::InsufficientStock {
                    product_id,
                    requested: quantity,
                    available: entry.available,
                });
            }
        }

        let mut reservation = StockReservation {
            order_id,
            lines: Vec::with_capacity(requested.len()),
        };
        for (product_id, quantity) in requested {
            if let Some(entry) = self.entries.get_mut(&product_id) {
                entry.available -= quantity;
                reservation.lines.push(ReservedLine { product_id, quantity });
            }
        }

        Ok(reservation)
    }

    /// Put back exactly what a reservation took. Nothing is restored unless
    /// every product is still tracked.
    pub fn release(&mut self, reservation: &StockReservation) -> Result<(), OrderError> {
        if let Some(missing) = reservation
            .lines
            .iter()
            .find(|l| !self.entries.contains_key(&l.product_id))
        {
            return Err(OrderError::ProductNotFound(missing.product_id));
        }

        for line in &reservation.lines {
            if let Some(entry) = self.entries.get_mut(&line.product_id) {
                entry.available += line.quantity;
            }
        }
        Ok(())
    }

    /// Products in the reservation that are now at or below their restock
    /// threshold.
    pub fn below_threshold(&self, reservation: &StockReservation) -> Vec<(Uuid, Quantity)> {
        reservation
            .lines
            .iter()
            .filter_map(|l| {
                self.entries
                    .get(&l.product_id)
                    .filter(|e| e.available <= e.restock_threshold)
                    .map(|e| (l.product_id, e.available))
            })
            .collect()
    }
}
