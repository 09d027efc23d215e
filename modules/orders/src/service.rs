//! Order operations and the events they publish

use std::sync::Arc;

use chrono::Utc;
use event_relay::{CancellationToken, EventPublisher, PublishError};
use order_contracts::{OrderCancelledEvent, OrderCreatedEvent, OrderItem, OrderUpdatedEvent};
use uuid::Uuid;

use crate::models::{CreateOrderRequest, Order, OrderLine};
use crate::store::OrderStore;

/// Persists orders and publishes one event per state change.
///
/// The store write happens before the publish, so a failed publish leaves
/// the order saved but unannounced. Callers decide whether to retry.
pub struct OrderService {
    store: Arc<OrderStore>,
    publisher: EventPublisher,
}

impl OrderService {
    pub fn new(store: Arc<OrderStore>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Create an order in `Pending` status and announce it.
    ///
    /// The order total is the sum of the line totals.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
        cancellation: &CancellationToken,
    ) -> Result<Order, PublishError> {
        let total_amount: f64 = request.items.iter().map(OrderLine::line_total).sum();
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_email: request.customer_email,
            total_amount,
            status: "Pending".to_string(),
            created_at: now,
            updated_at: now,
            items: request.items,
        };
        self.store.save(order.clone());

        let event = OrderCreatedEvent::new(
            order.id,
            order.customer_email.clone(),
            order.total_amount,
            contract_items(&order),
        );
        self.publisher.publish(&event, cancellation).await?;

        tracing::info!(
            order_id = %order.id,
            customer_email = %order.customer_email,
            total_amount = order.total_amount,
            "Created order"
        );
        Ok(order)
    }

    /// Set a new status on an existing order and announce the change.
    ///
    /// Returns `Ok(None)` for an unknown id; nothing is published.
    pub async fn update_order(
        &self,
        order_id: Uuid,
        status: impl Into<String>,
        cancellation: &CancellationToken,
    ) -> Result<Option<Order>, PublishError> {
        let Some(mut order) = self.store.get(order_id) else {
            return Ok(None);
        };
        order.status = status.into();
        order.updated_at = Utc::now();
        self.store.save(order.clone());

        let event = OrderUpdatedEvent::new(
            order.id,
            order.customer_email.clone(),
            order.total_amount,
            contract_items(&order),
            order.status.clone(),
        );
        self.publisher.publish(&event, cancellation).await?;

        tracing::info!(order_id = %order.id, status = %order.status, "Updated order status");
        Ok(Some(order))
    }

    /// Cancel an existing order and announce the cancellation with its
    /// reason. Returns `Ok(None)` for an unknown id; nothing is published.
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: impl Into<String>,
        cancellation: &CancellationToken,
    ) -> Result<Option<Order>, PublishError> {
        let Some(mut order) = self.store.get(order_id) else {
            return Ok(None);
        };
        let reason = reason.into();
        order.status = "Cancelled".to_string();
        order.updated_at = Utc::now();
        self.store.save(order.clone());

        let event = OrderCancelledEvent::new(
            order.id,
            order.customer_email.clone(),
            reason.clone(),
            contract_items(&order),
        );
        self.publisher.publish(&event, cancellation).await?;

        tracing::info!(order_id = %order.id, reason = %reason, "Cancelled order");
        Ok(Some(order))
    }

    pub fn order(&self, id: Uuid) -> Option<Order> {
        self.store.get(id)
    }

    /// All orders, newest first.
    pub fn orders(&self) -> Vec<Order> {
        self.store.all()
    }
}

fn contract_items(order: &Order) -> Vec<OrderItem> {
    order.items.iter().map(OrderItem::from).collect()
}
