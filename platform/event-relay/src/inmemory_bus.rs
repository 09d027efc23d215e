//! In-memory implementation of the EventBus trait for testing and development

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{oneshot, Notify};

use crate::{
    BusError, BusResult, Disposition, Envelope, EventBus, InboundMessage, MessageAcker, QueueSpec,
};

/// A message parked in a queue between publish and settle.
struct QueuedMessage {
    envelope: Envelope,
    redelivered: bool,
}

#[derive(Default)]
struct QueueState {
    bindings: Vec<String>,
    messages: VecDeque<QueuedMessage>,
    arrivals: Arc<Notify>,
}

#[derive(Default)]
struct ExchangeState {
    queues: HashMap<String, QueueState>,
}

/// EventBus implementation backed by in-process queues
///
/// This implementation is suitable for:
/// - Unit tests (no external dependencies)
/// - Local development without a broker container
/// - Integration tests that need fast, isolated messaging
///
/// It keeps the semantics the AMQP implementation has: topic bindings with
/// `*` / `#` patterns, durable per-queue buffers that outlive consumer
/// streams, one unacknowledged delivery at a time per stream, and
/// nack+requeue returning the message to the queue head with the
/// redelivered flag set. Publishing to a routing key no queue is bound to
/// drops the message, exactly as a topic exchange does.
///
/// # Example
/// ```rust
/// use event_relay::{Envelope, EventBus, InMemoryBus, QueueSpec};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
///
/// // Declare the queue and its bindings before publishing
/// let spec = QueueSpec::new("billing.queue", vec!["ordercreated".into()]);
/// let mut deliveries = bus.consume(&spec).await?;
///
/// let envelope = Envelope {
///     discriminator: "OrderCreatedEvent".into(),
///     message_id: "m-1".into(),
///     timestamp: 0,
///     body: b"{}".to_vec(),
/// };
/// bus.publish("ordercreated", envelope).await?;
///
/// let delivery = deliveries.next().await.unwrap();
/// assert_eq!(delivery.envelope.discriminator, "OrderCreatedEvent");
/// delivery.ack().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<ExchangeState>>,
}

impl InMemoryBus {
    /// Create a new in-memory event bus with no queues declared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages currently parked in `queue`.
    ///
    /// Zero for queues that were never declared. Intended for tests and
    /// diagnostics.
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.lock()
            .queues
            .get(queue)
            .map_or(0, |q| q.messages.len())
    }

    /// Check whether a routing key matches a binding pattern.
    ///
    /// Topic-exchange wildcards:
    /// - `*` matches exactly one word
    /// - `#` matches zero or more words
    ///
    /// # Examples
    /// - `order.*` matches `order.created` but not `order.created.eu`
    /// - `order.#` matches `order`, `order.created`, `order.created.eu`
    /// - `ordercreated` matches only `ordercreated`
    fn matches_pattern(routing_key: &str, pattern: &str) -> bool {
        let key: Vec<&str> = routing_key.split('.').collect();
        let pattern: Vec<&str> = pattern.split('.').collect();

        // Two-pointer walk; on mismatch, backtrack to the most recent `#`
        // and let it swallow one more word.
        let mut k = 0;
        let mut p = 0;
        let mut hash_p: Option<usize> = None;
        let mut hash_k = 0;

        while k < key.len() {
            if p < pattern.len() && (pattern[p] == "*" || pattern[p] == key[k]) {
                k += 1;
                p += 1;
            } else if p < pattern.len() && pattern[p] == "#" {
                hash_p = Some(p + 1);
                hash_k = k;
                p += 1;
            } else if let Some(after_hash) = hash_p {
                p = after_hash;
                hash_k += 1;
                k = hash_k;
            } else {
                return false;
            }
        }

        // Any trailing `#` tokens match zero words.
        while p < pattern.len() && pattern[p] == "#" {
            p += 1;
        }
        p == pattern.len()
    }

    fn lock(&self) -> MutexGuard<'_, ExchangeState> {
        self.state.lock().expect("bus state poisoned")
    }

    fn pop_front(&self, queue: &str) -> Option<QueuedMessage> {
        self.lock()
            .queues
            .get_mut(queue)
            .and_then(|q| q.messages.pop_front())
    }

    fn push_front_redelivered(&self, queue: &str, mut message: QueuedMessage) {
        message.redelivered = true;
        let mut state = self.lock();
        if let Some(q) = state.queues.get_mut(queue) {
            q.messages.push_front(message);
            q.arrivals.notify_one();
        }
    }
}

/// Settles one in-memory delivery; requeues it when dropped unsettled.
struct InMemoryAcker {
    bus: InMemoryBus,
    queue: String,
    message: Option<QueuedMessage>,
    gate: Option<oneshot::Sender<()>>,
}

#[async_trait]
impl MessageAcker for InMemoryAcker {
    async fn settle(&mut self, disposition: Disposition) -> BusResult<()> {
        let Some(message) = self.message.take() else {
            return Err(BusError::Settle("delivery already settled".to_string()));
        };
        if disposition == Disposition::Requeue {
            self.bus.push_front_redelivered(&self.queue, message);
        }
        if let Some(gate) = self.gate.take() {
            let _ = gate.send(());
        }
        Ok(())
    }
}

impl Drop for InMemoryAcker {
    fn drop(&mut self) {
        // An unsettled delivery behaves like an AMQP channel closing with an
        // unacked message: it returns to its queue.
        if let Some(message) = self.message.take() {
            self.bus.push_front_redelivered(&self.queue, message);
        }
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, routing_key: &str, envelope: Envelope) -> BusResult<()> {
        let mut state = self.lock();
        for queue in state.queues.values_mut() {
            let bound = queue
                .bindings
                .iter()
                .any(|binding| Self::matches_pattern(routing_key, binding));
            if bound {
                queue.messages.push_back(QueuedMessage {
                    envelope: envelope.clone(),
                    redelivered: false,
                });
                queue.arrivals.notify_one();
            }
        }
        // No matching binding: the exchange drops the message.
        Ok(())
    }

    async fn consume(&self, spec: &QueueSpec) -> BusResult<BoxStream<'static, InboundMessage>> {
        // Idempotent declare: create the queue if needed, add any new
        // bindings, keep parked messages.
        let arrivals = {
            let mut state = self.lock();
            let queue = state.queues.entry(spec.name.clone()).or_default();
            for binding in &spec.bindings {
                if !queue.bindings.contains(binding) {
                    queue.bindings.push(binding.clone());
                }
            }
            queue.arrivals.clone()
        };

        let bus = self.clone();
        let queue_name = spec.name.clone();

        let stream = async_stream::stream! {
            loop {
                // Take the next parked message, waiting for arrivals when
                // the queue is empty. The notified future is armed before
                // the pop so a publish in between cannot be missed.
                let message = loop {
                    let notified = arrivals.notified();
                    tokio::pin!(notified);
                    notified.as_mut().enable();
                    if let Some(message) = bus.pop_front(&queue_name) {
                        break message;
                    }
                    notified.await;
                };

                let (gate_tx, gate_rx) = oneshot::channel();
                yield InboundMessage::new(
                    message.envelope.clone(),
                    message.redelivered,
                    Box::new(InMemoryAcker {
                        bus: bus.clone(),
                        queue: queue_name.clone(),
                        message: Some(message),
                        gate: Some(gate_tx),
                    }),
                );

                // Prefetch = 1: hold until the outstanding delivery settles
                // (or its acker drops, which requeues it).
                let _ = gate_rx.await;
            }
        };

        Ok(stream.boxed())
    }
}
