//! Publisher: seals typed events and writes them to the exchange

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::envelope::{routing_key, DomainEvent, Envelope};
use crate::{BusError, EventBus};

/// Errors surfaced to the publishing caller.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] BusError),

    #[error("publish cancelled")]
    Cancelled,
}

/// Publishes domain events to the shared exchange.
///
/// One network write per call; the connection and channel behind the bus are
/// reused across calls and owned by this publishing role alone. There is no
/// internal retry: a transport failure surfaces as
/// [`PublishError::Transport`] and the caller decides whether to retry,
/// queue locally, or drop.
pub struct EventPublisher {
    bus: Arc<dyn EventBus>,
}

impl EventPublisher {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// Seal `event` and write it under its routing key.
    ///
    /// The message carries `message-id` = event id, `timestamp` =
    /// whole-second occurrence time, `type` = discriminator, and the
    /// persistent delivery flag.
    ///
    /// An already-cancelled token fails fast without touching the bus. A
    /// cancellation landing mid-call returns [`PublishError::Cancelled`],
    /// but a write already at the network layer is not guaranteed to abort.
    pub async fn publish<E>(
        &self,
        event: &E,
        cancellation: &CancellationToken,
    ) -> Result<(), PublishError>
    where
        E: DomainEvent + Serialize,
    {
        if cancellation.is_cancelled() {
            return Err(PublishError::Cancelled);
        }

        let envelope = Envelope::seal(event)?;
        let key = routing_key(E::DISCRIMINATOR);
        let event_id = envelope.message_id.clone();

        tokio::select! {
            _ = cancellation.cancelled() => Err(PublishError::Cancelled),
            result = self.bus.publish(&key, envelope) => {
                result?;
                tracing::info!(
                    discriminator = E::DISCRIMINATOR,
                    routing_key = %key,
                    event_id = %event_id,
                    "Published event"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use futures::stream::BoxStream;
    use serde::Deserialize;
    use std::sync::Mutex;
    use uuid::Uuid;

    use crate::{BusResult, InboundMessage, QueueSpec};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct CartCheckedOutEvent {
        event_id: Uuid,
        occurred_at: DateTime<Utc>,
        #[serde(rename = "version")]
        schema_version: u32,
        cart_id: Uuid,
    }

    impl CartCheckedOutEvent {
        fn sample() -> Self {
            Self {
                event_id: Uuid::new_v4(),
                occurred_at: Utc::now(),
                schema_version: 1,
                cart_id: Uuid::new_v4(),
            }
        }
    }

    impl DomainEvent for CartCheckedOutEvent {
        const DISCRIMINATOR: &'static str = "CartCheckedOutEvent";

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

    /// Records publishes; refuses to consume.
    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<(String, Envelope)>>,
        fail_publish: bool,
    }

    #[async_trait]
    impl EventBus for RecordingBus {
        async fn publish(&self, routing_key: &str, envelope: Envelope) -> BusResult<()> {
            if self.fail_publish {
                return Err(BusError::Publish("broker unreachable".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((routing_key.to_string(), envelope));
            Ok(())
        }

        async fn consume(&self, _spec: &QueueSpec) -> BusResult<BoxStream<'static, InboundMessage>> {
            Err(BusError::Consume("publish-only test bus".to_string()))
        }
    }

    #[tokio::test]
    async fn test_publish_writes_one_sealed_message() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = EventPublisher::new(bus.clone());
        let event = CartCheckedOutEvent::sample();

        publisher
            .publish(&event, &CancellationToken::new())
            .await
            .unwrap();

        let published = bus.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        let (key, envelope) = &published[0];
        assert_eq!(key, "cartcheckedout");
        assert_eq!(envelope.discriminator, "CartCheckedOutEvent");
        assert_eq!(envelope.message_id, event.event_id.to_string());
        assert_eq!(envelope.timestamp, event.occurred_at.timestamp() as u64);
    }

    #[tokio::test]
    async fn test_cancelled_token_fails_fast_without_publishing() {
        let bus = Arc::new(RecordingBus::default());
        let publisher = EventPublisher::new(bus.clone());
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let result = publisher
            .publish(&CartCheckedOutEvent::sample(), &cancellation)
            .await;

        assert!(matches!(result, Err(PublishError::Cancelled)));
        assert!(bus.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_to_the_caller() {
        let bus = Arc::new(RecordingBus {
            fail_publish: true,
            ..RecordingBus::default()
        });
        let publisher = EventPublisher::new(bus);

        let result = publisher
            .publish(&CartCheckedOutEvent::sample(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(PublishError::Transport(BusError::Publish(_)))
        ));
    }
}
