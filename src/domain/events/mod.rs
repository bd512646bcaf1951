//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductEvent {
    StockTaken { product_id: Uuid, size: String, quantity: u32 },
    BackInStock { product_id: Uuid, size: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { display_order_id: String, user_id: String, total: Decimal },
    Paid { display_order_id: String, payment_id: Option<String> },
    StatusChanged { display_order_id: String, from: OrderStatus, to: OrderStatus },
    Shipped { display_order_id: String, shipment_id: Option<String>, awb: Option<String> },
    Cancelled { display_order_id: String },
    ExchangeRequested { display_order_id: String, original_order_id: String },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> String {
        let name = match self {
            Self::Product(ProductEvent::StockTaken { .. }) => "products.stock_taken",
            Self::Product(ProductEvent::BackInStock { .. }) => "products.back_in_stock",
            Self::Order(OrderEvent::Placed { .. }) => "orders.placed",
            Self::Order(OrderEvent::Paid { .. }) => "orders.paid",
            Self::Order(OrderEvent::StatusChanged { .. }) => "orders.status_changed",
            Self::Order(OrderEvent::Shipped { .. }) => "orders.shipped",
            Self::Order(OrderEvent::Cancelled { .. }) => "orders.cancelled",
            Self::Order(OrderEvent::ExchangeRequested { .. }) => "orders.exchange_requested",
        };
        format!("storefront.{name}")
    }
}

impl From<OrderEvent> for DomainEvent {
    fn from(e: OrderEvent) -> Self { Self::Order(e) }
}

impl From<ProductEvent> for DomainEvent {
    fn from(e: ProductEvent) -> Self { Self::Product(e) }
}

/// Publishes domain events to NATS when a connection is configured.
#[derive(Clone, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }
    pub fn disabled() -> Self { Self { nats: None } }

    pub async fn publish(&self, event: impl Into<DomainEvent>) {
        let event = event.into();
        let Some(nats) = &self.nats else {
            tracing::debug!(subject = %event.subject(), "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { tracing::warn!(error = %e, "failed to encode event"); return; }
        };
        if let Err(e) = nats.publish(event.subject(), payload.into()).await {
            tracing::warn!(error = %e, subject = %event.subject(), "failed to publish event");
        }
    }

    pub async fn publish_all<E: Into<DomainEvent>>(&self, events: impl IntoIterator<Item = E>) {
        for e in events { self.publish(e).await; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        let e: DomainEvent = OrderEvent::Cancelled { display_order_id: "ORD-1".into() }.into();
        assert_eq!(e.subject(), "storefront.orders.cancelled");
        let e: DomainEvent = ProductEvent::BackInStock { product_id: Uuid::nil(), size: "M".into() }.into();
        assert_eq!(e.subject(), "storefront.products.back_in_stock");
    }

    #[test]
    fn test_event_json_shape() {
        let e: DomainEvent = OrderEvent::StatusChanged {
            display_order_id: "ORD-1".into(), from: OrderStatus::PaymentSuccessful, to: OrderStatus::Shipped,
        }.into();
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "status_changed");
        assert_eq!(v["from"], "Payment Successful");
        assert_eq!(v["to"], "Shipped");
    }
}
