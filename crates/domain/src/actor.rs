use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregates::order::Order;
use crate::errors::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Carrier,
    Owner,
}

/// Something a caller wants to do to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    View,
    EditItems,
    Finalize,
    AssignCarrier(Uuid),
    StartTransit,
    MarkDelivered,
    Cancel,
    Rate,
}

impl OrderAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderAction::View => "view the order",
            OrderAction::EditItems => "edit the order",
            OrderAction::Finalize => "finalize the order",
            OrderAction::AssignCarrier(_) => "assign this carrier",
            OrderAction::StartTransit => "start transit",
            OrderAction::MarkDelivered => "mark the order delivered",
            OrderAction::Cancel => "cancel the order",
            OrderAction::Rate => "rate the carrier",
        }
    }
}

/// An authenticated user and their role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn customer(id: Uuid) -> Self {
        Self { id, role: Role::Customer }
    }

    pub fn carrier(id: Uuid) -> Self {
        Self { id, role: Role::Carrier }
    }

    pub fn owner(id: Uuid) -> Self {
        Self { id, role: Role::Owner }
    }

    pub fn can(&self, action: OrderAction, order: &Order) -> bool {
        match self.role {
            Role::Owner => !matches!(
                action,
                OrderAction::EditItems | OrderAction::Finalize | OrderAction::Rate
            ),
            Role::Customer => {
                order.customer_id() == self.id
                    && matches!(
                        action,
                        OrderAction::View
                            | OrderAction::EditItems
                            | OrderAction::Finalize
                            | OrderAction::Cancel
                            | OrderAction::Rate
                    )
            }
            Role::Carrier => match action {
                OrderAction::AssignCarrier(carrier_id) => carrier_id == self.id,
                OrderAction::View | OrderAction::StartTransit | OrderAction::MarkDelivered => {
                    order.carrier_id() == Some(self.id)
                }
                _ => false,
            },
        }
    }

    pub fn authorize(&self, action: OrderAction, order: &Order) -> Result<(), OrderError> {
        if self.can(action, order) {
            Ok(())
        } else {
            Err(OrderError::Forbidden {
                actor_id: self.id,
                action: action.as_str(),
            })
        }
    }
}
