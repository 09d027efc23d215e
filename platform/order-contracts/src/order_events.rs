//! Order Event Contract Types
//!
//! These types match the JSON schemas defined in:
//! contracts/events/order-created.v1.json
//! contracts/events/order-updated.v1.json
//! contracts/events/order-cancelled.v1.json
//!
//! IMPORTANT: Field names must match the JSON schema EXACTLY (case-sensitive,
//! camelCase on the wire, `schema_version` serialized as `version`). Decoding
//! ignores unknown fields so newer producers can add fields without breaking
//! older consumers.

use chrono::{DateTime, Utc};
use event_relay::{DomainEvent, EventTypeRegistry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single line item on an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Product identifier in the inventory catalog (e.g. "LAPTOP001")
    pub product_id: String,

    /// Human-readable product name at the time of ordering
    pub product_name: String,

    /// Number of units ordered (>= 1)
    pub quantity: u32,

    /// Price per unit at the time of ordering
    pub unit_price: f64,
}

/// Published when a new order has been placed
///
/// Consumed by inventory (stock reservation) and notifications (order
/// confirmation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    /// Unique identifier of this event occurrence
    pub event_id: Uuid,

    /// UTC timestamp of when the event occurred
    pub occurred_at: DateTime<Utc>,

    /// Schema version for additive evolution (currently 1)
    #[serde(rename = "version")]
    pub schema_version: u32,

    /// Identifier of the order that was created
    pub order_id: Uuid,

    /// Email address of the ordering customer
    pub customer_email: String,

    /// Order total: sum over items of quantity x unit price
    pub total_amount: f64,

    /// Line items on the order (at least one)
    pub items: Vec<OrderItem>,
}

impl OrderCreatedEvent {
    /// Build the event for a newly placed order, stamping identity and time.
    pub fn new(
        order_id: Uuid,
        customer_email: impl Into<String>,
        total_amount: f64,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            schema_version: 1,
            order_id,
            customer_email: customer_email.into(),
            total_amount,
            items,
        }
    }
}

impl DomainEvent for OrderCreatedEvent {
    const DISCRIMINATOR: &'static str = "OrderCreatedEvent";

    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Published when an existing order changed, typically its status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdatedEvent {
    /// Unique identifier of this event occurrence
    pub event_id: Uuid,

    /// UTC timestamp of when the event occurred
    pub occurred_at: DateTime<Utc>,

    /// Schema version for additive evolution (currently 1)
    #[serde(rename = "version")]
    pub schema_version: u32,

    /// Identifier of the order that changed
    pub order_id: Uuid,

    /// Email address of the ordering customer
    pub customer_email: String,

    /// Order total: sum over items of quantity x unit price
    pub total_amount: f64,

    /// Line items on the order
    pub items: Vec<OrderItem>,

    /// New status of the order (e.g. "Processing", "Shipped")
    pub status: String,
}

impl OrderUpdatedEvent {
    /// Build the event for an order change, stamping identity and time.
    pub fn new(
        order_id: Uuid,
        customer_email: impl Into<String>,
        total_amount: f64,
        items: Vec<OrderItem>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            schema_version: 1,
            order_id,
            customer_email: customer_email.into(),
            total_amount,
            items,
            status: status.into(),
        }
    }
}

impl DomainEvent for OrderUpdatedEvent {
    const DISCRIMINATOR: &'static str = "OrderUpdatedEvent";

    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Published when an order was cancelled
///
/// Consumed by inventory (reservation release) and notifications
/// (cancellation message).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledEvent {
    /// Unique identifier of this event occurrence
    pub event_id: Uuid,

    /// UTC timestamp of when the event occurred
    pub occurred_at: DateTime<Utc>,

    /// Schema version for additive evolution (currently 1)
    #[serde(rename = "version")]
    pub schema_version: u32,

    /// Identifier of the order that was cancelled
    pub order_id: Uuid,

    /// Email address of the ordering customer
    pub customer_email: String,

    /// Why the order was cancelled
    pub reason: String,

    /// Line items on the order, as they were when it was cancelled
    pub items: Vec<OrderItem>,
}

impl OrderCancelledEvent {
    /// Build the event for a cancelled order, stamping identity and time.
    pub fn new(
        order_id: Uuid,
        customer_email: impl Into<String>,
        reason: impl Into<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            schema_version: 1,
            order_id,
            customer_email: customer_email.into(),
            reason: reason.into(),
            items,
        }
    }
}

impl DomainEvent for OrderCancelledEvent {
    const DISCRIMINATOR: &'static str = "OrderCancelledEvent";

    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn schema_version(&self) -> u32 {
        self.schema_version
    }
}

/// Closed union over every order event kind on the wire.
///
/// Consumers decode deliveries into this union and match exhaustively;
/// adding an event kind extends the enum and every match is checked at
/// build time.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Created(OrderCreatedEvent),
    Updated(OrderUpdatedEvent),
    Cancelled(OrderCancelledEvent),
}

impl OrderEvent {
    /// Wire discriminator of the wrapped event.
    pub fn discriminator(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => OrderCreatedEvent::DISCRIMINATOR,
            OrderEvent::Updated(_) => OrderUpdatedEvent::DISCRIMINATOR,
            OrderEvent::Cancelled(_) => OrderCancelledEvent::DISCRIMINATOR,
        }
    }

    /// Identity of the wrapped event occurrence.
    pub fn event_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(event) => event.event_id,
            OrderEvent::Updated(event) => event.event_id,
            OrderEvent::Cancelled(event) => event.event_id,
        }
    }

    /// The order the wrapped event refers to.
    pub fn order_id(&self) -> Uuid {
        match self {
            OrderEvent::Created(event) => event.order_id,
            OrderEvent::Updated(event) => event.order_id,
            OrderEvent::Cancelled(event) => event.order_id,
        }
    }
}

impl From<OrderCreatedEvent> for OrderEvent {
    fn from(event: OrderCreatedEvent) -> Self {
        OrderEvent::Created(event)
    }
}

impl From<OrderUpdatedEvent> for OrderEvent {
    fn from(event: OrderUpdatedEvent) -> Self {
        OrderEvent::Updated(event)
    }
}

impl From<OrderCancelledEvent> for OrderEvent {
    fn from(event: OrderCancelledEvent) -> Self {
        OrderEvent::Cancelled(event)
    }
}

/// Registry over every order event kind, ready to hand to a consumer.
pub fn order_event_registry() -> EventTypeRegistry<OrderEvent> {
    let mut registry = EventTypeRegistry::new();
    registry.register_type::<OrderCreatedEvent>();
    registry.register_type::<OrderUpdatedEvent>();
    registry.register_type::<OrderCancelledEvent>();
    registry
}
