pub mod errors;
pub mod finalization;
pub mod memory;
pub mod ports;
pub mod service;
pub mod step;

pub use errors::{CheckoutError, Result};
pub use finalization::{Finalized, Finalizer, StepLog};
pub use memory::{InMemoryCoupons, InMemoryInventory, InMemoryOrders, ScheduledLoyalty, UnlimitedCapacity};
pub use ports::{
    CarrierCapacity, Catalog, CouponRepository, Inventory, LoyaltyTiers, OrderRepository,
    RatingRepository,
};
pub use service::{loyalty_schedule, OrderService, Ports};
pub use step::{FinalizationStep, StepRecord, StepStatus};
