//! # Event Relay
//!
//! Reliable event distribution between services over an AMQP topic exchange.
//!
//! Publishers seal typed domain events into wire envelopes (JSON body plus
//! `type` / `message-id` / `timestamp` metadata, persistent delivery) and
//! write them to a shared durable exchange. Each consuming service owns one
//! durable queue (`{service}.queue`) bound on the routing key of every event
//! type it knows, processes deliveries one at a time (prefetch = 1), and
//! settles each delivery with an ack or a nack+requeue depending on the
//! handler outcome.
//!
//! ## Implementations
//!
//! - **AmqpBus**: production implementation speaking AMQP 0-9-1 (RabbitMQ)
//! - **InMemoryBus**: test/dev implementation with the same topic, queue,
//!   prefetch, and requeue semantics, no broker required
//!
//! ## Usage
//!
//! ```rust,no_run
//! use event_relay::{AmqpBus, BrokerConfig, EventBus, InMemoryBus, QueueSpec};
//! use futures::StreamExt;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Production: AMQP broker, connections opened on first use
//! let bus: Arc<dyn EventBus> = Arc::new(AmqpBus::new(BrokerConfig::from_env()?));
//!
//! // Dev/Test: in-memory broker
//! let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
//!
//! // Consume from a durable queue bound to order events
//! let spec = QueueSpec::new("inventory.queue", vec!["ordercreated".into()]);
//! let mut deliveries = bus.consume(&spec).await?;
//! while let Some(delivery) = deliveries.next().await {
//!     println!(
//!         "{} bytes of {}",
//!         delivery.envelope.body.len(),
//!         delivery.envelope.discriminator
//!     );
//!     delivery.ack().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Most services do not talk to the bus directly: the publishing side goes
//! through [`EventPublisher`] and the consuming side through
//! [`EventConsumer`], which add envelope sealing, registry-based decoding,
//! handler dispatch, and the ack/requeue policy on top of this trait.

mod amqp_bus;
mod config;
mod consumer;
mod envelope;
mod handler;
mod inmemory_bus;
mod publisher;
mod registry;

pub use amqp_bus::AmqpBus;
pub use config::BrokerConfig;
pub use consumer::{
    ConsumerHandle, ConsumerStatus, EventConsumer, DEFAULT_RECONNECT_INTERVAL,
    DEFAULT_STARTUP_GRACE,
};
pub use envelope::{routing_key, DomainEvent, Envelope};
pub use handler::{EventHandler, HandlerError, HandlerRegistry, HandlerResult};
pub use inmemory_bus::InMemoryBus;
pub use publisher::{EventPublisher, PublishError};
pub use registry::{DecodeFn, EventTypeRegistry};

// Handlers and consumers share one cancellation primitive; re-exported so
// downstream crates do not need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;

/// Errors that can occur when talking to the broker
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to connect to broker: {0}")]
    Connect(String),

    #[error("failed to declare broker topology: {0}")]
    Topology(String),

    #[error("failed to publish message: {0}")]
    Publish(String),

    #[error("failed to start consuming: {0}")]
    Consume(String),

    #[error("failed to settle delivery: {0}")]
    Settle(String),
}

/// Result type for bus operations
pub type BusResult<T> = Result<T, BusError>;

/// How a delivery is settled once the consumer is done with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message from the queue permanently.
    Ack,
    /// Return the message to the head of the queue for redelivery.
    Requeue,
}

/// Settles a single delivery back to the broker. Implementations are consumed
/// through [`InboundMessage::ack`] / [`InboundMessage::requeue`].
#[async_trait]
pub trait MessageAcker: Send {
    async fn settle(&mut self, disposition: Disposition) -> BusResult<()>;
}

/// A delivery received from a queue.
///
/// Each delivery must be settled exactly once; dropping it unsettled counts
/// as a consumer failure and the broker (or the in-memory bus) returns the
/// message to its queue.
pub struct InboundMessage {
    /// The wire envelope: discriminator, identity, timestamp, payload.
    pub envelope: Envelope,
    /// True when the broker has delivered this message before.
    pub redelivered: bool,
    acker: Box<dyn MessageAcker>,
}

impl InboundMessage {
    /// Create a delivery. Used by [`EventBus`] implementations.
    pub fn new(envelope: Envelope, redelivered: bool, acker: Box<dyn MessageAcker>) -> Self {
        Self {
            envelope,
            redelivered,
            acker,
        }
    }

    /// Acknowledge the delivery, removing it from the queue.
    pub async fn ack(mut self) -> BusResult<()> {
        self.acker.settle(Disposition::Ack).await
    }

    /// Negatively acknowledge the delivery, returning it to the head of the
    /// queue for redelivery.
    pub async fn requeue(mut self) -> BusResult<()> {
        self.acker.settle(Disposition::Requeue).await
    }
}

impl fmt::Debug for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("envelope", &self.envelope)
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

/// A durable queue and the routing keys it binds to on the shared exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    /// Queue name, by convention `{service}.queue`.
    pub name: String,
    /// Routing keys bound between the queue and the exchange.
    pub bindings: Vec<String>,
}

impl QueueSpec {
    pub fn new(name: impl Into<String>, bindings: Vec<String>) -> Self {
        Self {
            name: name.into(),
            bindings,
        }
    }
}

/// Broker abstraction for topic-routed, queue-buffered messaging
///
/// Publishing writes one envelope to the shared exchange under a routing
/// key; the exchange copies it into every queue whose bindings match.
/// Consuming declares a durable queue with its bindings and yields
/// deliveries one unacknowledged message at a time (prefetch = 1).
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an envelope to the shared exchange under `routing_key`.
    ///
    /// The message is marked persistent so it survives a broker restart
    /// while it sits in a queue unacknowledged.
    async fn publish(&self, routing_key: &str, envelope: Envelope) -> BusResult<()>;

    /// Declare `spec`'s queue and bindings, then stream its deliveries.
    ///
    /// Declares are idempotent. The returned stream owns the transport
    /// resources behind it; dropping the stream releases them, and a stream
    /// that ends signals a lost subscription (the caller decides whether to
    /// call `consume` again).
    async fn consume(&self, spec: &QueueSpec) -> BusResult<BoxStream<'static, InboundMessage>>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}
