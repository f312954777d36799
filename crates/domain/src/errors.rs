use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::{LifecycleEvent, OrderStatus};
use crate::money::{Quantity, Rate};

/// Every way an order operation can be refused. None of these are transient,
/// so callers should not retry them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("Invalid line item for product {product_id}: {reason}")]
    InvalidLineItem { product_id: Uuid, reason: String },

    #[error("Order must have at least one item")]
    EmptyOrder,

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: Quantity,
        available: Quantity,
    },

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Coupon not found: {0}")]
    CouponNotFound(String),

    #[error("Coupon {0} belongs to another customer")]
    CouponNotOwned(String),

    #[error("Coupon {0} has already been used")]
    CouponAlreadyUsed(String),

    #[error("Coupon {0} has expired")]
    CouponExpired(String),

    #[error("Illegal transition: event '{event}' not allowed in status '{current}'")]
    IllegalTransition {
        current: OrderStatus,
        event: LifecycleEvent,
    },

    #[error("Order items are frozen after finalization")]
    ItemsFrozen,

    #[error("Order has not been finalized")]
    OrderNotFinalized,

    #[error("Order is {current}, only delivered orders can be rated")]
    NotDelivered { current: OrderStatus },

    #[error("Carrier {0} has no capacity for another order")]
    CarrierUnavailable(Uuid),

    #[error("Actor {actor_id} may not {action}")]
    Forbidden { actor_id: Uuid, action: &'static str },

    #[error("Rating score must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("Order {0} has already been rated")]
    AlreadyRated(Uuid),

    #[error("Loyalty rate must be in [0, 100), got {0}")]
    InvalidLoyaltyRate(Rate),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl OrderError {
    /// Short stable label, used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::InvalidLineItem { .. } => "invalid_line_item",
            OrderError::EmptyOrder => "empty_order",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::CouponNotFound(_) => "coupon_not_found",
            OrderError::CouponNotOwned(_) => "coupon_not_owned",
            OrderError::CouponAlreadyUsed(_) => "coupon_already_used",
            OrderError::CouponExpired(_) => "coupon_expired",
            OrderError::IllegalTransition { .. } => "illegal_transition",
            OrderError::ItemsFrozen => "items_frozen",
            OrderError::OrderNotFinalized => "order_not_finalized",
            OrderError::NotDelivered { .. } => "not_delivered",
            OrderError::CarrierUnavailable(_) => "carrier_unavailable",
            OrderError::Forbidden { .. } => "forbidden",
            OrderError::InvalidRating(_) => "invalid_rating",
            OrderError::AlreadyRated(_) => "already_rated",
            OrderError::InvalidLoyaltyRate(_) => "invalid_loyalty_rate",
            OrderError::Validation(_) => "validation",
        }
    }
}

impl From<validator::ValidationErrors> for OrderError {
    fn from(errors: validator::ValidationErrors) -> Self {
        OrderError::Validation(errors.to_string())
    }
}
