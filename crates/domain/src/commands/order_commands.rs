use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::money::Quantity;

/// Command to open an order and fill it in one go
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderCommand {
    pub customer_id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Delivery address must be 1-200 characters"))]
    pub delivery_address: String,

    #[validate(custom(function = "validate_items"))]
    pub items: Vec<PlaceOrderItem>,

    #[validate(length(min = 1, max = 32, message = "Coupon code must be 1-32 characters"))]
    pub coupon_code: Option<String>,
}

/// Order item in the place order command
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PlaceOrderItem {
    pub product_id: Uuid,

    #[validate(custom(function = "validate_positive_quantity"))]
    pub quantity: Quantity,
}

/// Command for a carrier (or the owner) to take an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignCarrierCommand {
    pub order_id: Uuid,
    pub carrier_id: Uuid,
}

/// Command to cancel an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
}

/// Command to rate the carrier of a delivered order
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateCarrierCommand {
    pub order_id: Uuid,

    #[validate(range(min = 1, max = 5, message = "Score must be between 1 and 5"))]
    pub score: u8,

    #[validate(length(max = 500, message = "Comment must be at most 500 characters"))]
    pub comment: Option<String>,
}

fn validate_positive_quantity(quantity: &Quantity) -> Result<(), ValidationError> {
    if quantity.is_positive() {
        Ok(())
    } else {
        Err(ValidationError::new("quantity_not_positive"))
    }
}

fn validate_items(items: &Vec<PlaceOrderItem>) -> Result<(), ValidationError> {
    if items.is_empty() {
        return Err(ValidationError::new("order_has_no_items"));
    }
    if items.iter().any(|i| validate_positive_quantity(&i.quantity).is_err()) {
        return Err(ValidationError::new("quantity_not_positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn place_order(items: Vec<PlaceOrderItem>) -> PlaceOrderCommand {
        PlaceOrderCommand {
            customer_id: Uuid::new_v4(),
            delivery_address: "12 Market Street".to_string(),
            items,
            coupon_code: None,
        }
    }

    #[test]
    fn test_place_order_command_validation() {
        let cmd = place_order(vec![PlaceOrderItem {
            product_id: Uuid::new_v4(),
            quantity: Quantity::kg(dec!(1.25)),
        }]);

        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn test_place_order_command_empty_items_fails() {
        assert!(place_order(vec![]).validate().is_err());
    }

    #[test]
    fn test_place_order_item_zero_quantity_fails() {
        let item = PlaceOrderItem {
            product_id: Uuid::new_v4(),
            quantity: Quantity::ZERO,
        };

        assert!(item.validate().is_err());
        assert!(place_order(vec![item]).validate().is_err());
    }

    #[test]
    fn test_place_order_empty_coupon_code_fails() {
        let mut cmd = place_order(vec![PlaceOrderItem {
            product_id: Uuid::new_v4(),
            quantity: Quantity::kg(dec!(1)),
        }]);
        cmd.coupon_code = Some(String::new());

        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_rate_carrier_score_range() {
        let mut cmd = RateCarrierCommand {
            order_id: Uuid::new_v4(),
            score: 5,
            comment: Some("Friendly and fast".to_string()),
        };
        assert!(cmd.validate().is_ok());

        cmd.score = 0;
        assert!(cmd.validate().is_err());

        cmd.score = 6;
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_rate_carrier_long_comment_fails() {
        let cmd = RateCarrierCommand {
            order_id: Uuid::new_v4(),
            score: 3,
            comment: Some("x".repeat(501)),
        };
        assert!(cmd.validate().is_err());
    }
}
