use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::actor::{Actor, OrderAction};
use crate::aggregates::order::Order;
use crate::errors::OrderError;
use crate::events::order_events::CarrierRatedEvent;
use crate::lifecycle::OrderStatus;

pub const MAX_COMMENT_CHARS: usize = 500;

/// A customer's score for the carrier that delivered their order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierRating {
    pub id: Uuid,
    pub order_id: Uuid,
    pub carrier_id: Uuid,
    pub customer_id: Uuid,
    pub score: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CarrierRating {
    pub fn for_order(
        order: &Order,
        actor: &Actor,
        score: u8,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(Self, CarrierRatedEvent), OrderError> {
        actor.authorize(OrderAction::Rate, order)?;

        if order.status() != OrderStatus::Delivered {
            return Err(OrderError::NotDelivered {
                current: order.status(),
            });
        }
        let carrier_id = order.carrier_id().ok_or(OrderError::NotDelivered {
            current: order.status(),
        })?;

        if !(1..=5).contains(&score) {
            return Err(OrderError::InvalidRating(score));
        }
        let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        if comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_CHARS)
        {
            return Err(OrderError::Validation(format!(
                "comment must be at most {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        let rating = Self {
            id: Uuid::new_v4(),
            order_id: order.id(),
            carrier_id,
            customer_id: order.customer_id(),
            score,
            comment,
            created_at: now,
        };
        let event = CarrierRatedEvent {
            order_id: order.id(),
            carrier_id,
            score,
            rated_at: now,
        };

        Ok((rating, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, Product};
    use crate::inventory::StockLedger;
    use crate::money::{Money, Quantity, Rate};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn delivered_order() -> Order {
        let now = Utc::now();
        let melon = Product::new("Melon", "Fruit", Money::new(dec!(2.10)), Quantity::kg(dec!(30)));
        let catalog = CatalogSnapshot::new(vec![melon.clone()]);
        let mut ledger = StockLedger::from_products([&melon]);

        let (mut order, _) =
            Order::create(Uuid::new_v4(), "3 Orchard Lane", Rate::ZERO, now, Duration::minutes(30)).unwrap();
        order.add_item(&melon, Quantity::kg(dec!(3.2))).unwrap();
        let reservation = ledger.reserve(order.id(), order.reservation_lines()).unwrap();
        order.finalize(&catalog, None, Rate::ZERO, reservation, now).unwrap();
        order.assign_carrier(Uuid::new_v4(), now).unwrap();
        order.start_transit(now).unwrap();
        order.mark_delivered(now).unwrap();
        order
    }

    #[test]
    fn test_customer_rates_delivered_order() {
        let order = delivered_order();
        let actor = Actor::customer(order.customer_id());

        let (rating, event) =
            CarrierRating::for_order(&order, &actor, 5, Some(" On time ".to_string()), Utc::now()).unwrap();
        assert_eq!(rating.comment.as_deref(), Some("On time"));
        assert_eq!(Some(rating.carrier_id), order.carrier_id());
        assert_eq!(event.score, 5);
    }

    #[test]
    fn test_score_out_of_range() {
        let order = delivered_order();
        let actor = Actor::customer(order.customer_id());

        for score in [0, 6] {
            let err = CarrierRating::for_order(&order, &actor, score, None, Utc::now()).unwrap_err();
            assert_eq!(err, OrderError::InvalidRating(score));
        }
    }

    #[test]
    fn test_only_the_customer_rates() {
        let order = delivered_order();
        let stranger = Actor::customer(Uuid::new_v4());
        let err = CarrierRating::for_order(&order, &stranger, 4, None, Utc::now()).unwrap_err();
        assert!(matches!(err, OrderError::Forbidden { .. }));
    }

    #[test]
    fn test_pending_order_cannot_be_rated() {
        let (order, _) = Order::create(
            Uuid::new_v4(),
            "3 Orchard Lane",
            Rate::ZERO,
            Utc::now(),
            Duration::minutes(30),
        )
        .unwrap();
        let actor = Actor::customer(order.customer_id());

        let err = CarrierRating::for_order(&order, &actor, 4, None, Utc::now()).unwrap_err();
        assert_eq!(err, OrderError::NotDelivered { current: OrderStatus::Pending });
    }
}
