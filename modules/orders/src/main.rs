use std::sync::Arc;

use event_relay::{AmqpBus, BrokerConfig, CancellationToken, EventBus, EventPublisher};
use orders_rs::{CreateOrderRequest, OrderLine, OrderService, OrderStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!("Starting orders service...");

    // Load configuration from environment
    let config = BrokerConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!(
        "Configuration loaded: broker={}:{}, exchange={}",
        config.host,
        config.port,
        config.exchange
    );

    // Create event bus and publisher
    let bus: Arc<dyn EventBus> = Arc::new(AmqpBus::new(config));
    let publisher = EventPublisher::new(bus);
    let service = OrderService::new(Arc::new(OrderStore::new()), publisher);

    let cancellation = CancellationToken::new();

    // Walk one sample order through its lifecycle
    let order = service
        .create_order(
            CreateOrderRequest {
                customer_email: "customer@example.com".to_string(),
                items: vec![
                    OrderLine {
                        product_id: "LAPTOP001".to_string(),
                        product_name: "Gaming Laptop".to_string(),
                        quantity: 1,
                        unit_price: 2899.99,
                    },
                    OrderLine {
                        product_id: "MOUSE001".to_string(),
                        product_name: "Wireless Mouse".to_string(),
                        quantity: 2,
                        unit_price: 24.99,
                    },
                ],
            },
            &cancellation,
        )
        .await
        .expect("Failed to publish order created event");

    service
        .update_order(order.id, "Processing", &cancellation)
        .await
        .expect("Failed to publish order updated event");

    service
        .cancel_order(order.id, "Customer requested cancellation", &cancellation)
        .await
        .expect("Failed to publish order cancelled event");

    tracing::info!(
        "Demo complete: order {} created, updated and cancelled",
        order.id
    );
}
