use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::OrderError;
use crate::money::{Money, Quantity, Rate};

/// A product sold by weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub price_per_kg: Money,
    pub stock: Quantity,
    pub restock_threshold: Quantity,
    pub discount_percent: Option<Rate>,
    pub original_price: Option<Money>,
}

impl Product {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price_per_kg: Money, stock: Quantity) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: category.into(),
            price_per_kg,
            stock,
            restock_threshold: Quantity::ZERO,
            discount_percent: None,
            original_price: None,
        }
    }

    pub fn with_restock_threshold(mut self, threshold: Quantity) -> Self {
        self.restock_threshold = threshold;
        self
    }

    /// Put the product on promotion: the shelf price becomes
    /// `original_price` reduced by `discount_percent`.
    pub fn with_promotion(mut self, original_price: Money, discount_percent: Rate) -> Self {
        self.original_price = Some(original_price);
        self.discount_percent = Some(discount_percent);
        self
    }

    /// Price a customer pays per kilogram right now.
    pub fn effective_price(&self) -> Money {
        match (self.original_price, self.discount_percent) {
            (Some(original), Some(percent)) if !percent.is_zero() => {
                let factor = Decimal::ONE - percent.fraction();
                Money::new(original.amount() * factor).rounded()
            }
            _ => self.price_per_kg,
        }
    }

    pub fn needs_restock(&self) -> bool {
        self.stock <= self.restock_threshold
    }
}

/// Read-only view of the catalog taken before pricing an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    products: HashMap<Uuid, Product>,
}

impl CatalogSnapshot {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: products.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    pub fn get_product(&self, product_id: Uuid) -> Result<&Product, OrderError> {
        self.products
            .get(&product_id)
            .ok_or(OrderError::ProductNotFound(product_id))
    }

    pub fn insert(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_effective_price_without_promotion() {
        let apples = Product::new("Apples", "Fruit", Money::new(dec!(2.50)), Quantity::kg(dec!(40)));
        assert_eq!(apples.effective_price(), Money::new(dec!(2.50)));
    }

    #[test]
    fn test_effective_price_with_promotion() {
        let cherries = Product::new("Cherries", "Fruit", Money::new(dec!(12.00)), Quantity::kg(dec!(5)))
            .with_promotion(Money::new(dec!(12.00)), Rate::percent(dec!(25)));
        assert_eq!(cherries.effective_price(), Money::new(dec!(9.00)));
    }

    #[test]
    fn test_needs_restock() {
        let leeks = Product::new("Leeks", "Vegetables", Money::new(dec!(3)), Quantity::kg(dec!(2)))
            .with_restock_threshold(Quantity::kg(dec!(2)));
        assert!(leeks.needs_restock());
    }

    #[test]
    fn test_snapshot_lookup() {
        let pears = Product::new("Pears", "Fruit", Money::new(dec!(3.20)), Quantity::kg(dec!(10)));
        let id = pears.id;
        let snapshot = CatalogSnapshot::new(vec![pears]);

        assert_eq!(snapshot.get_product(id).unwrap().name, "Pears");
        let missing = Uuid::new_v4();
        assert_eq!(
            snapshot.get_product(missing).unwrap_err(),
            OrderError::ProductNotFound(missing)
        );
    }
}
