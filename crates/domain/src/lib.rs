pub mod actor;
pub mod aggregates;
pub mod catalog;
pub mod clock;
pub mod commands;
pub mod coupon;
pub mod errors;
pub mod events;
pub mod inventory;
pub mod lifecycle;
pub mod loyalty;
pub mod money;
pub mod pricing;
pub mod rating;

pub use actor::{Actor, OrderAction, Role};
pub use aggregates::order::Order;
pub use catalog::{CatalogSnapshot, Product};
pub use clock::{Clock, FixedClock, SystemClock};
pub use coupon::{Coupon, CouponBook, CouponEffect, Redemption};
pub use errors::OrderError;
pub use events::order_events::OrderItem;
pub use inventory::{StockLedger, StockReservation};
pub use lifecycle::{LifecycleEvent, OrderStatus};
pub use loyalty::{LoyaltySchedule, LoyaltyTier};
pub use money::{Money, Quantity, Rate};
pub use pricing::{PriceBreakdown, PricingCalculator};
pub use rating::CarrierRating;
