//! AMQP 0-9-1 implementation of the EventBus trait

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tokio::sync::Mutex;

use crate::config::BrokerConfig;
use crate::{
    BusError, BusResult, Disposition, Envelope, EventBus, InboundMessage, MessageAcker, QueueSpec,
};

/// EventBus implementation speaking AMQP 0-9-1 (RabbitMQ)
///
/// This is the production implementation. Construction is free of I/O: the
/// publishing connection and channel are opened on the first `publish` and
/// reused afterwards; a failed publish drops them so the next call redials.
/// Every `consume` call opens its own connection and channel, owned by the
/// returned delivery stream; dropping the stream releases both, so a
/// reconnecting consumer never leaks the previous channel.
///
/// One `AmqpBus` instance belongs to one publishing or consuming role;
/// unrelated roles open their own instance.
///
/// # Example
/// ```rust,no_run
/// use event_relay::{AmqpBus, BrokerConfig, Envelope, EventBus};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = AmqpBus::new(BrokerConfig::from_env()?);
///
/// let envelope = Envelope {
///     discriminator: "OrderCreatedEvent".into(),
///     message_id: "9f2c…".into(),
///     timestamp: 1_700_000_000,
///     body: b"{}".to_vec(),
/// };
/// bus.publish("ordercreated", envelope).await?;
/// # Ok(())
/// # }
/// ```
pub struct AmqpBus {
    config: BrokerConfig,
    publish_channel: Mutex<Option<PublishChannel>>,
}

/// The channel publishes go through, plus the connection keeping it open.
struct PublishChannel {
    _connection: Connection,
    channel: Channel,
}

impl AmqpBus {
    /// Create a bus for the given broker settings. No I/O happens here.
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            publish_channel: Mutex::new(None),
        }
    }

    /// Broker settings this bus was built with.
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    async fn open_publish_channel(&self) -> BusResult<PublishChannel> {
        let connection = connect(&self.config).await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        declare_exchange(&channel, &self.config.exchange).await?;
        tracing::debug!(
            exchange = %self.config.exchange,
            host = %self.config.host,
            "Opened publish channel"
        );
        Ok(PublishChannel {
            _connection: connection,
            channel,
        })
    }
}

async fn connect(config: &BrokerConfig) -> BusResult<Connection> {
    Connection::connect(&config.amqp_uri(), ConnectionProperties::default())
        .await
        .map_err(|e| BusError::Connect(e.to_string()))
}

async fn declare_exchange(channel: &Channel, exchange: &str) -> BusResult<()> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| BusError::Topology(e.to_string()))
}

async fn write_message(
    channel: &Channel,
    exchange: &str,
    routing_key: &str,
    envelope: &Envelope,
) -> BusResult<()> {
    // delivery_mode 2 = persistent: the message survives a broker restart
    // while parked unacknowledged in a durable queue.
    let properties = BasicProperties::default()
        .with_delivery_mode(2)
        .with_message_id(envelope.message_id.clone().into())
        .with_timestamp(envelope.timestamp)
        .with_kind(envelope.discriminator.clone().into());

    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            &envelope.body,
            properties,
        )
        .await
        .map_err(|e| BusError::Publish(e.to_string()))?
        .await
        .map_err(|e| BusError::Publish(e.to_string()))?;
    Ok(())
}

fn envelope_from_delivery(data: Vec<u8>, properties: &BasicProperties) -> Envelope {
    Envelope {
        discriminator: properties
            .kind()
            .as_ref()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        message_id: properties
            .message_id()
            .as_ref()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        timestamp: properties.timestamp().as_ref().copied().unwrap_or(0),
        body: data,
    }
}

/// Settles one AMQP delivery through its broker acker.
struct AmqpAcker {
    acker: lapin::acker::Acker,
}

#[async_trait]
impl MessageAcker for AmqpAcker {
    async fn settle(&mut self, disposition: Disposition) -> BusResult<()> {
        let result = match disposition {
            Disposition::Ack => self.acker.ack(BasicAckOptions::default()).await,
            Disposition::Requeue => {
                self.acker
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..Default::default()
                    })
                    .await
            }
        };
        result.map_err(|e| BusError::Settle(e.to_string()))
    }
}

#[async_trait]
impl EventBus for AmqpBus {
    async fn publish(&self, routing_key: &str, envelope: Envelope) -> BusResult<()> {
        let mut slot = self.publish_channel.lock().await;
        let publish = match slot.take() {
            Some(existing) => existing,
            None => self.open_publish_channel().await?,
        };

        match write_message(&publish.channel, &self.config.exchange, routing_key, &envelope).await {
            Ok(()) => {
                // Keep the channel for the next publish.
                *slot = Some(publish);
                Ok(())
            }
            // The channel is dropped here; the next publish redials.
            Err(error) => Err(error),
        }
    }

    async fn consume(&self, spec: &QueueSpec) -> BusResult<BoxStream<'static, InboundMessage>> {
        // Fresh connection and channel per subscription; both ride inside
        // the returned stream and are released when it drops.
        let connection = connect(&self.config).await?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;

        declare_exchange(&channel, &self.config.exchange).await?;

        channel
            .queue_declare(
                &spec.name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Topology(e.to_string()))?;

        for routing_key in &spec.bindings {
            channel
                .queue_bind(
                    &spec.name,
                    &self.config.exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| BusError::Topology(e.to_string()))?;
        }

        // One unacknowledged delivery at a time.
        channel
            .basic_qos(1, BasicQosOptions::default())
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        let consumer = channel
            .basic_consume(
                &spec.name,
                "",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::Consume(e.to_string()))?;

        tracing::debug!(
            queue = %spec.name,
            bindings = ?spec.bindings,
            exchange = %self.config.exchange,
            "Consuming from queue"
        );

        let queue_name = spec.name.clone();
        let stream = async_stream::stream! {
            let _connection = connection;
            let _channel = channel;
            let mut consumer = consumer;

            while let Some(attempt) = consumer.next().await {
                match attempt {
                    Ok(delivery) => {
                        let Delivery {
                            data,
                            properties,
                            redelivered,
                            acker,
                            ..
                        } = delivery;
                        let envelope = envelope_from_delivery(data, &properties);
                        yield InboundMessage::new(
                            envelope,
                            redelivered,
                            Box::new(AmqpAcker { acker }),
                        );
                    }
                    Err(error) => {
                        tracing::warn!(queue = %queue_name, %error, "AMQP delivery stream failed");
                        break;
                    }
                }
            }
            // Ending the stream signals a lost subscription; the caller
            // decides whether to consume again.
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;
    use uuid::Uuid;

    // Note: These tests require a running RabbitMQ broker
    // For CI, use InMemoryBus tests instead
    // For manual testing: docker run -p 5672:5672 rabbitmq:3-management

    #[tokio::test]
    #[ignore] // Requires RabbitMQ broker
    async fn test_amqp_publish_consume_roundtrip() {
        let bus = AmqpBus::new(BrokerConfig::default());

        let spec = QueueSpec::new("relay-test.queue", vec!["relaysmoketested".to_string()]);
        let mut deliveries = bus
            .consume(&spec)
            .await
            .expect("RabbitMQ must be running on localhost:5672");

        let envelope = Envelope {
            discriminator: "RelaySmokeTestedEvent".to_string(),
            message_id: Uuid::new_v4().to_string(),
            timestamp: 1_700_000_000,
            body: br#"{"ok":true}"#.to_vec(),
        };
        bus.publish("relaysmoketested", envelope.clone())
            .await
            .unwrap();

        let delivery = timeout(Duration::from_secs(5), deliveries.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended");

        assert_eq!(delivery.envelope, envelope);
        assert!(!delivery.redelivered);
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires RabbitMQ broker
    async fn test_amqp_requeue_redelivers_to_the_same_queue() {
        let bus = AmqpBus::new(BrokerConfig::default());

        let spec = QueueSpec::new("relay-requeue.queue", vec!["relayrequeued".to_string()]);
        let mut deliveries = bus
            .consume(&spec)
            .await
            .expect("RabbitMQ must be running on localhost:5672");

        let envelope = Envelope {
            discriminator: "RelayRequeuedEvent".to_string(),
            message_id: Uuid::new_v4().to_string(),
            timestamp: 1_700_000_000,
            body: b"{}".to_vec(),
        };
        bus.publish("relayrequeued", envelope.clone()).await.unwrap();

        let first = timeout(Duration::from_secs(5), deliveries.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended");
        first.requeue().await.unwrap();

        let second = timeout(Duration::from_secs(5), deliveries.next())
            .await
            .expect("timeout waiting for redelivery")
            .expect("stream ended");
        assert_eq!(second.envelope.message_id, envelope.message_id);
        assert!(second.redelivered);
        second.ack().await.unwrap();
    }
}
