use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::OrderError;

/// Delivery lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Assigned,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Whether the status alone still permits cancellation. The deadline is
    /// checked separately by the aggregate.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Assigned)
    }

    /// Resolve the status an event leads to, or fail with
    /// `IllegalTransition` naming both sides.
    pub fn transition(self, event: LifecycleEvent) -> Result<OrderStatus, OrderError> {
        use LifecycleEvent::*;
        use OrderStatus::*;

        match (self, event) {
            (Pending, AssignCarrier) => Ok(Assigned),
            (Assigned, StartTransit) => Ok(InTransit),
            (InTransit, MarkDelivered) => Ok(Delivered),
            (Pending, Cancel) | (Assigned, Cancel) => Ok(Cancelled),
            (current, event) => Err(OrderError::IllegalTransition { current, event }),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests that move an order through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    AssignCarrier,
    StartTransit,
    MarkDelivered,
    Cancel,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::AssignCarrier => "assign_carrier",
            LifecycleEvent::StartTransit => "start_transit",
            LifecycleEvent::MarkDelivered => "mark_delivered",
            LifecycleEvent::Cancel => "cancel",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::InTransit,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    const ALL_EVENTS: [LifecycleEvent; 4] = [
        LifecycleEvent::AssignCarrier,
        LifecycleEvent::StartTransit,
        LifecycleEvent::MarkDelivered,
        LifecycleEvent::Cancel,
    ];

    #[test]
    fn test_happy_path() {
        let status = OrderStatus::Pending
            .transition(LifecycleEvent::AssignCarrier)
            .and_then(|s| s.transition(LifecycleEvent::StartTransit))
            .and_then(|s| s.transition(LifecycleEvent::MarkDelivered))
            .unwrap();
        assert_eq!(status, OrderStatus::Delivered);
        assert!(status.is_terminal());
    }

    #[test]
    fn test_cancel_only_from_pending_or_assigned() {
        for status in ALL_STATUSES {
            let result = status.transition(LifecycleEvent::Cancel);
            if status.is_cancellable() {
                assert_eq!(result.unwrap(), OrderStatus::Cancelled);
            } else {
                assert!(matches!(
                    result,
                    Err(OrderError::IllegalTransition { current, event: LifecycleEvent::Cancel })
                        if current == status
                ));
            }
        }
    }

    #[test]
    fn test_nothing_reenters_pending() {
        for status in ALL_STATUSES {
            for event in ALL_EVENTS {
                if let Ok(next) = status.transition(event) {
                    assert_ne!(next, OrderStatus::Pending);
                }
            }
        }
    }

    #[test]
    fn test_assign_carrier_in_transit_is_illegal() {
        let err = OrderStatus::InTransit
            .transition(LifecycleEvent::AssignCarrier)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Illegal transition: event 'assign_carrier' not allowed in status 'IN_TRANSIT'"
        );
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for status in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for event in ALL_EVENTS {
                assert!(status.transition(event).is_err());
            }
        }
    }
}
