//! Order event handlers for the notification service

use std::sync::Arc;

use async_trait::async_trait;
use event_relay::{CancellationToken, DomainEvent, EventHandler, HandlerRegistry, HandlerResult};
use order_contracts::{OrderCancelledEvent, OrderCreatedEvent, OrderEvent, OrderUpdatedEvent};

use crate::service::NotificationService;

/// Sends the order confirmation when an order is created.
///
/// This handler:
/// 1. Receives the order created event
/// 2. Composes a confirmation subject and message, itemising the order
/// 3. Records and (mock) delivers the notification
pub struct OrderConfirmationHandler {
    service: Arc<NotificationService>,
}

impl OrderConfirmationHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for OrderConfirmationHandler {
    async fn handle(&self, event: &OrderEvent, _cancellation: &CancellationToken) -> HandlerResult {
        let OrderEvent::Created(created) = event else {
            return Ok(());
        };
        tracing::info!(order_id = %created.order_id, "Processing order created event");

        let subject = format!("Order Confirmation - Order #{}", created.order_id);
        let item_lines: Vec<String> = created
            .items
            .iter()
            .map(|item| {
                format!(
                    "- {} x {} @ ${:.2}",
                    item.product_name, item.quantity, item.unit_price
                )
            })
            .collect();
        let message = format!(
            "Thank you for your order!\n\nOrder ID: {}\nTotal Amount: ${:.2}\nItems:\n{}",
            created.order_id,
            created.total_amount,
            item_lines.join("\n")
        );

        self.service
            .send(
                created.customer_email.as_str(),
                subject,
                message,
                "OrderCreated",
                Some(created.order_id),
            )
            .await;
        Ok(())
    }
}

/// Sends a status update notice when an order changes status.
///
/// This handler:
/// 1. Receives the order updated event
/// 2. Composes a message naming the new status
/// 3. Records and (mock) delivers the notification
pub struct StatusUpdateHandler {
    service: Arc<NotificationService>,
}

impl StatusUpdateHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for StatusUpdateHandler {
    async fn handle(&self, event: &OrderEvent, _cancellation: &CancellationToken) -> HandlerResult {
        let OrderEvent::Updated(updated) = event else {
            return Ok(());
        };
        tracing::info!(order_id = %updated.order_id, "Processing order updated event");

        let subject = format!("Order Status Update - Order #{}", updated.order_id);
        let message = format!(
            "Your order status has been updated.\n\nOrder ID: {}\nNew Status: {}\nTotal Amount: ${:.2}",
            updated.order_id, updated.status, updated.total_amount
        );

        self.service
            .send(
                updated.customer_email.as_str(),
                subject,
                message,
                "OrderUpdated",
                Some(updated.order_id),
            )
            .await;
        Ok(())
    }
}

/// Sends the cancellation notice when an order is cancelled.
///
/// This handler:
/// 1. Receives the order cancelled event
/// 2. Composes a message carrying the cancellation reason
/// 3. Records and (mock) delivers the notification
pub struct CancellationNoticeHandler {
    service: Arc<NotificationService>,
}

impl CancellationNoticeHandler {
    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for CancellationNoticeHandler {
    async fn handle(&self, event: &OrderEvent, _cancellation: &CancellationToken) -> HandlerResult {
        let OrderEvent::Cancelled(cancelled) = event else {
            return Ok(());
        };
        tracing::info!(order_id = %cancelled.order_id, "Processing order cancelled event");

        let subject = format!("Order Cancellation - Order #{}", cancelled.order_id);
        let message = format!(
            "Your order has been cancelled.\n\nOrder ID: {}\nReason: {}\nIf you have any questions, please contact our support team.",
            cancelled.order_id, cancelled.reason
        );

        self.service
            .send(
                cancelled.customer_email.as_str(),
                subject,
                message,
                "OrderCancelled",
                Some(cancelled.order_id),
            )
            .await;
        Ok(())
    }
}

/// The handler registry for this service: one notification per event kind.
pub fn order_handlers(service: Arc<NotificationService>) -> HandlerRegistry<OrderEvent> {
    let mut handlers = HandlerRegistry::new();
    handlers.register(
        OrderCreatedEvent::DISCRIMINATOR,
        Arc::new(OrderConfirmationHandler::new(service.clone())),
    );
    handlers.register(
        OrderUpdatedEvent::DISCRIMINATOR,
        Arc::new(StatusUpdateHandler::new(service.clone())),
    );
    handlers.register(
        OrderCancelledEvent::DISCRIMINATOR,
        Arc::new(CancellationNoticeHandler::new(service)),
    );
    handlers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use event_relay::{EventConsumer, EventPublisher, InMemoryBus};
    use order_contracts::{order_event_registry, OrderItem};
    use serde::Serialize;
    use tokio::time::timeout;
    use uuid::Uuid;

    use crate::store::NotificationStore;

    fn notification_consumer(
        bus: &InMemoryBus,
        handlers: HandlerRegistry<OrderEvent>,
    ) -> EventConsumer<OrderEvent> {
        EventConsumer::new(
            Arc::new(bus.clone()),
            "notification",
            order_event_registry(),
            handlers,
        )
        .with_startup_grace(Duration::ZERO)
        .with_reconnect_interval(Duration::from_millis(10))
    }

    fn sample_items() -> Vec<OrderItem> {
        vec![OrderItem {
            product_id: "LAPTOP001".to_string(),
            product_name: "Gaming Laptop".to_string(),
            quantity: 1,
            unit_price: 2899.99,
        }]
    }

    async fn publish<E: DomainEvent + Serialize>(bus: &InMemoryBus, event: &E) {
        EventPublisher::new(Arc::new(bus.clone()))
            .publish(event, &CancellationToken::new())
            .await
            .expect("publish should succeed");
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_order_created_sends_a_confirmation() {
        let bus = InMemoryBus::new();
        let store = Arc::new(NotificationStore::new());
        let service = Arc::new(NotificationService::new(store.clone()));
        let handle = notification_consumer(&bus, order_handlers(service)).start();

        let order_id = Uuid::new_v4();
        publish(
            &bus,
            &OrderCreatedEvent::new(order_id, "customer@example.com", 2899.99, sample_items()),
        )
        .await;

        wait_until(|| store.for_order(order_id).iter().any(|n| n.is_sent)).await;
        handle.stop().await;

        let notifications = store.for_order(order_id);
        assert_eq!(notifications.len(), 1);
        let confirmation = &notifications[0];
        assert_eq!(confirmation.recipient_email, "customer@example.com");
        assert_eq!(confirmation.notification_type, "OrderCreated");
        assert_eq!(
            confirmation.subject,
            format!("Order Confirmation - Order #{}", order_id)
        );
        assert!(confirmation.message.contains("Gaming Laptop"));
        assert!(confirmation.message.contains("$2899.99"));
        assert!(confirmation.is_sent);
        assert!(confirmation.sent_at.is_some());
    }

    #[tokio::test]
    async fn test_each_event_kind_produces_its_own_notification() {
        let bus = InMemoryBus::new();
        let store = Arc::new(NotificationStore::new());
        let service = Arc::new(NotificationService::new(store.clone()));
        let handle = notification_consumer(&bus, order_handlers(service)).start();

        let order_id = Uuid::new_v4();
        let items = sample_items();
        publish(
            &bus,
            &OrderCreatedEvent::new(order_id, "customer@example.com", 2899.99, items.clone()),
        )
        .await;
        publish(
            &bus,
            &OrderUpdatedEvent::new(
                order_id,
                "customer@example.com",
                2899.99,
                items.clone(),
                "Processing",
            ),
        )
        .await;
        publish(
            &bus,
            &OrderCancelledEvent::new(
                order_id,
                "customer@example.com",
                "Customer requested cancellation",
                items,
            ),
        )
        .await;

        wait_until(|| {
            let sent = store.for_order(order_id);
            sent.len() == 3 && sent.iter().all(|n| n.is_sent)
        })
        .await;
        handle.stop().await;

        let notifications = store.for_order(order_id);
        let types: Vec<&str> = notifications
            .iter()
            .map(|n| n.notification_type.as_str())
            .collect();
        assert_eq!(types, vec!["OrderCreated", "OrderUpdated", "OrderCancelled"]);
        assert!(notifications[1].message.contains("New Status: Processing"));
        assert!(notifications[2]
            .message
            .contains("Reason: Customer requested cancellation"));
    }
}
