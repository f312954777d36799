pub mod order_events;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::aggregates::order::Order;

/// Aggregate type recorded on every order envelope
pub const ORDER_AGGREGATE: &str = "Order";

/// One entry of an order's history, saved together with the order snapshot
/// it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub aggregate_type: String,
    pub event_type: String,
    pub event_version: i32,
    pub payload: serde_json::Value,
    pub metadata: EventMetadata,
    pub timestamp: DateTime<Utc>,
    /// Order version right after the change
    pub sequence_number: Option<i64>,
}

impl EventEnvelope {
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.event_type == E::event_type()
    }

    /// Read the payload back as a typed event.
    pub fn decode<E: DomainEvent>(&self) -> Result<E, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Who asked for a change and which request it belonged to. Every event of
/// one order shares the order id as correlation id; each command gets a
/// fresh causation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub correlation_id: Uuid,
    pub causation_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<Role>,
}

impl EventMetadata {
    pub fn for_order(order_id: Uuid) -> Self {
        Self {
            correlation_id: order_id,
            causation_id: Uuid::new_v4(),
            actor_id: None,
            actor_role: None,
        }
    }

    pub fn by(mut self, actor: &Actor) -> Self {
        self.actor_id = Some(actor.id);
        self.actor_role = Some(actor.role);
        self
    }
}

/// A fact recorded in an order's history
pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> {
    fn event_type() -> &'static str;

    fn event_version() -> i32 {
        1
    }

    /// When the event happened, as seen by the injected clock
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Wrap the event for `order`'s history. Call after the change has been
    /// applied so the sequence number matches the saved version.
    fn to_envelope(&self, order: &Order, metadata: EventMetadata) -> Result<EventEnvelope, serde_json::Error> {
        Ok(EventEnvelope {
            event_id: Uuid::new_v4(),
            aggregate_id: order.id(),
            aggregate_type: ORDER_AGGREGATE.to_string(),
            event_type: Self::event_type().to_string(),
            event_version: Self::event_version(),
            payload: serde_json::to_value(self)?,
            metadata,
            timestamp: self.occurred_at(),
            sequence_number: Some(order.version()),
        })
    }
}
