//! Order event handlers for the inventory service

use std::sync::Arc;

use async_trait::async_trait;
use event_relay::{CancellationToken, DomainEvent, EventHandler, HandlerRegistry, HandlerResult};
use order_contracts::{OrderCancelledEvent, OrderCreatedEvent, OrderEvent, OrderItem};

use crate::service::InventoryService;

/// Reserves stock when an order is created.
///
/// This handler:
/// 1. Receives the order created event
/// 2. Reserves stock for every order line, all or nothing
/// 3. Fails the delivery when the reservation is refused, so the broker
///    redelivers the order later
pub struct ReserveStockHandler {
    service: Arc<InventoryService>,
}

impl ReserveStockHandler {
    pub fn new(service: Arc<InventoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for ReserveStockHandler {
    async fn handle(&self, event: &OrderEvent, _cancellation: &CancellationToken) -> HandlerResult {
        let OrderEvent::Created(created) = event else {
            return Ok(());
        };
        tracing::info!(order_id = %created.order_id, "Processing order created event");

        self.service
            .reserve(created.order_id, &stock_lines(&created.items))?;

        Ok(())
    }
}

/// Releases reserved stock when an order is cancelled.
///
/// This handler:
/// 1. Receives the order cancelled event
/// 2. Returns each line's reservation to the pool
/// 3. Never fails: unknown products are skipped and reservations floor at
///    zero
pub struct ReleaseStockHandler {
    service: Arc<InventoryService>,
}

impl ReleaseStockHandler {
    pub fn new(service: Arc<InventoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler<OrderEvent> for ReleaseStockHandler {
    async fn handle(&self, event: &OrderEvent, _cancellation: &CancellationToken) -> HandlerResult {
        let OrderEvent::Cancelled(cancelled) = event else {
            return Ok(());
        };
        tracing::info!(order_id = %cancelled.order_id, "Processing order cancelled event");

        self.service
            .release(cancelled.order_id, &stock_lines(&cancelled.items));

        Ok(())
    }
}

/// The handler registry for this service: reserve on create, release on
/// cancel. Order updates have no handler here; the consumer acknowledges
/// them unprocessed.
pub fn order_handlers(service: Arc<InventoryService>) -> HandlerRegistry<OrderEvent> {
    let mut handlers = HandlerRegistry::new();
    handlers.register(
        OrderCreatedEvent::DISCRIMINATOR,
        Arc::new(ReserveStockHandler::new(service.clone())),
    );
    handlers.register(
        OrderCancelledEvent::DISCRIMINATOR,
        Arc::new(ReleaseStockHandler::new(service)),
    );
    handlers
}

fn stock_lines(items: &[OrderItem]) -> Vec<(String, i64)> {
    items
        .iter()
        .map(|item| (item.product_id.clone(), i64::from(item.quantity)))
        .collect()
}
