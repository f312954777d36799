use common::ConfigError;
use domain::OrderError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("Concurrent update of order {order_id}: expected version {expected:?}, found {actual:?}")]
    ConcurrencyConflict {
        order_id: Uuid,
        expected: Option<i64>,
        actual: Option<i64>,
    },

    #[error("Compensation of step '{step}' failed ({reason}) after: {cause}")]
    CompensationFailed {
        step: &'static str,
        reason: String,
        cause: Box<CheckoutError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckoutError {
    /// Short stable label, used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::Order(e) => e.kind(),
            CheckoutError::Config(_) => "config",
            CheckoutError::OrderNotFound(_) => "order_not_found",
            CheckoutError::ConcurrencyConflict { .. } => "concurrency_conflict",
            CheckoutError::CompensationFailed { .. } => "compensation_failed",
            CheckoutError::Serialization(_) => "serialization",
        }
    }

    /// The domain error behind this failure, if there is one
    pub fn as_order_error(&self) -> Option<&OrderError> {
        match self {
            CheckoutError::Order(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
