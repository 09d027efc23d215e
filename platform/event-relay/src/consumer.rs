//! Consumer loop: one durable queue per service, decoded dispatch, ack or
//! requeue per delivery

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::handler::HandlerRegistry;
use crate::registry::EventTypeRegistry;
use crate::{Disposition, EventBus, InboundMessage, QueueSpec};

/// Initial delay before the first subscription attempt, giving a broker that
/// starts alongside the service time to come up.
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(5);

/// Pause between losing a subscription and trying again.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(10);

/// Lifecycle stage of a running consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerStatus {
    /// No live subscription; waiting before the next attempt.
    Disconnected,
    /// A subscription attempt is in flight.
    Connecting,
    /// The queue is declared, bound, and delivering.
    Subscribed,
    /// Shut down. Terminal.
    Stopped,
}

/// Subscribes one service to its durable queue and dispatches deliveries.
///
/// The queue is named `{service}.queue` and bound on the routing key of every
/// event kind in the type registry, so the queue collects all known events
/// whether or not this process handles them. Deliveries arrive one at a time
/// and each is settled exactly once:
///
/// - unknown discriminator → ack (drop; a newer producer is ahead of us)
/// - known discriminator, payload fails to decode → nack+requeue
/// - decoded, no handler registered → ack (drop)
/// - any handler fails → nack+requeue, so the broker redelivers
/// - all handlers succeed → ack
///
/// A lost or failed subscription is retried forever on a fixed interval.
/// Shutdown via [`ConsumerHandle::stop`] lets an in-flight delivery finish
/// and settle before the task exits.
///
/// # Example
/// ```rust,no_run
/// use event_relay::{
///     ConsumerStatus, EventConsumer, EventTypeRegistry, HandlerRegistry, InMemoryBus,
/// };
/// use std::sync::Arc;
///
/// # #[derive(Debug)]
/// # enum AppEvent {}
/// # async fn example() {
/// let registry: EventTypeRegistry<AppEvent> = EventTypeRegistry::new();
/// let handlers: HandlerRegistry<AppEvent> = HandlerRegistry::new();
///
/// let consumer = EventConsumer::new(
///     Arc::new(InMemoryBus::new()),
///     "inventory",
///     registry,
///     handlers,
/// );
/// let mut handle = consumer.start();
///
/// handle.wait_for_status(ConsumerStatus::Subscribed).await;
/// // ... run until shutdown ...
/// handle.stop().await;
/// # }
/// ```
pub struct EventConsumer<E> {
    bus: Arc<dyn EventBus>,
    service: String,
    registry: EventTypeRegistry<E>,
    handlers: HandlerRegistry<E>,
    startup_grace: Duration,
    reconnect_interval: Duration,
}

impl<E: Send + Sync + 'static> EventConsumer<E> {
    pub fn new(
        bus: Arc<dyn EventBus>,
        service: impl Into<String>,
        registry: EventTypeRegistry<E>,
        handlers: HandlerRegistry<E>,
    ) -> Self {
        Self {
            bus,
            service: service.into(),
            registry,
            handlers,
            startup_grace: DEFAULT_STARTUP_GRACE,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Spawn the consumer task and return its handle.
    pub fn start(self) -> ConsumerHandle {
        let shutdown = CancellationToken::new();
        let (status_tx, status_rx) = watch::channel(ConsumerStatus::Disconnected);
        let task = tokio::spawn(self.run(shutdown.clone(), status_tx));
        ConsumerHandle {
            task,
            shutdown,
            status: status_rx,
        }
    }

    async fn run(self, shutdown: CancellationToken, status: watch::Sender<ConsumerStatus>) {
        let spec = QueueSpec::new(
            format!("{}.queue", self.service),
            self.registry.routing_keys(),
        );

        if !self.startup_grace.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.startup_grace) => {}
                _ = shutdown.cancelled() => {
                    let _ = status.send(ConsumerStatus::Stopped);
                    return;
                }
            }
        }

        loop {
            let _ = status.send(ConsumerStatus::Connecting);
            match self.bus.consume(&spec).await {
                Ok(mut deliveries) => {
                    let _ = status.send(ConsumerStatus::Subscribed);
                    tracing::info!(
                        service = %self.service,
                        queue = %spec.name,
                        bindings = ?spec.bindings,
                        "Consumer subscribed"
                    );

                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            delivery = deliveries.next() => match delivery {
                                // Dispatch is not raced against shutdown: an
                                // in-flight delivery runs to completion and is
                                // settled before the loop checks again.
                                Some(message) => self.dispatch(message, &shutdown).await,
                                None => {
                                    tracing::warn!(service = %self.service, "Subscription lost");
                                    break;
                                }
                            },
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(service = %self.service, %error, "Subscription attempt failed");
                }
            }

            if shutdown.is_cancelled() {
                break;
            }
            let _ = status.send(ConsumerStatus::Disconnected);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_interval) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        let _ = status.send(ConsumerStatus::Stopped);
        tracing::info!(service = %self.service, "Consumer stopped");
    }

    async fn dispatch(&self, message: InboundMessage, shutdown: &CancellationToken) {
        let span = tracing::info_span!(
            "dispatch",
            service = %self.service,
            discriminator = %message.envelope.discriminator,
            message_id = %message.envelope.message_id,
            redelivered = message.redelivered,
        );
        self.process(message, shutdown).instrument(span).await;
    }

    async fn process(&self, message: InboundMessage, shutdown: &CancellationToken) {
        let Some(decode) = self.registry.resolve(&message.envelope.discriminator) else {
            // A newer producer is ahead of this consumer. Dropping the
            // message is safe; requeueing it would loop forever.
            tracing::info!("Ignoring unknown event kind");
            settle(message, Disposition::Ack).await;
            return;
        };

        let event = match decode(&message.envelope.body) {
            Ok(event) => event,
            Err(error) => {
                // A known kind with an undecodable payload points at schema
                // drift. Keep the message; a fixed build of this service can
                // still process it.
                tracing::error!(%error, "Failed to decode event payload");
                settle(message, Disposition::Requeue).await;
                return;
            }
        };

        let handlers = self.handlers.handlers_for(&message.envelope.discriminator);
        if handlers.is_empty() {
            tracing::debug!("No handler registered; dropping event");
            settle(message, Disposition::Ack).await;
            return;
        }

        let mut failed = false;
        for handler in handlers {
            if let Err(error) = handler.handle(&event, shutdown).await {
                tracing::warn!(%error, "Handler failed; delivery will be requeued");
                failed = true;
                break;
            }
        }

        if failed {
            // Redelivery has no retry ceiling and no dead-letter parking; a
            // permanently failing handler sees the same message forever.
            settle(message, Disposition::Requeue).await;
        } else {
            settle(message, Disposition::Ack).await;
        }
    }
}

async fn settle(message: InboundMessage, disposition: Disposition) {
    let result = match disposition {
        Disposition::Ack => message.ack().await,
        Disposition::Requeue => message.requeue().await,
    };
    if let Err(error) = result {
        // The broker treats the unsettled delivery as abandoned and
        // redelivers it.
        tracing::warn!(%error, ?disposition, "Failed to settle delivery");
    }
}

/// Handle to a spawned consumer: status feed plus shutdown.
#[derive(Debug)]
pub struct ConsumerHandle {
    task: JoinHandle<()>,
    shutdown: CancellationToken,
    status: watch::Receiver<ConsumerStatus>,
}

impl ConsumerHandle {
    /// Most recent lifecycle status.
    pub fn status(&self) -> ConsumerStatus {
        *self.status.borrow()
    }

    /// A watch on the lifecycle status, for observing transitions from
    /// elsewhere.
    pub fn status_feed(&self) -> watch::Receiver<ConsumerStatus> {
        self.status.clone()
    }

    /// Wait until the consumer reaches `target`. Returns false when the
    /// consumer task ends without reaching it.
    pub async fn wait_for_status(&mut self, target: ConsumerStatus) -> bool {
        self.status
            .wait_for(|status| *status == target)
            .await
            .is_ok()
    }

    /// Signal shutdown and wait for the consumer task to finish. An
    /// in-flight delivery completes and settles first.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(error) = self.task.await {
            tracing::warn!(%error, "Consumer task failed");
        }
    }
}
