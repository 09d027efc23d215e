use std::sync::Arc;

use event_relay::{AmqpBus, BrokerConfig, EventBus, EventConsumer};
use notifications_rs::handlers::order_handlers;
use notifications_rs::{NotificationService, NotificationStore};
use order_contracts::order_event_registry;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting notification service...");

    // Load configuration from environment
    let config = BrokerConfig::from_env().expect("Failed to load configuration from environment");

    let store = Arc::new(NotificationStore::new());
    let service = Arc::new(NotificationService::new(store));

    // Create event bus and start the consumer
    let bus: Arc<dyn EventBus> = Arc::new(AmqpBus::new(config));
    let consumer = EventConsumer::new(
        bus,
        "notification",
        order_event_registry(),
        order_handlers(service),
    );
    let handle = consumer.start();

    tracing::info!("Notification service running; press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");

    tracing::info!("Shutting down...");
    handle.stop().await;
}
