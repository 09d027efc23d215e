//! Validates the golden example payloads under contracts/events/ against
//! their JSON schemas and against the typed contract structs.

use std::fs;
use std::path::{Path, PathBuf};

use order_contracts::{
    order_event_registry, OrderCancelledEvent, OrderCreatedEvent, OrderEvent, OrderUpdatedEvent,
};

fn contracts_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("contracts")
}

fn load_json(path: &Path) -> serde_json::Value {
    let raw = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    serde_json::from_str(&raw)
        .unwrap_or_else(|e| panic!("failed to parse {}: {}", path.display(), e))
}

fn load_example(name: &str) -> serde_json::Value {
    load_json(&contracts_dir().join(format!("events/examples/{}.v1.example.json", name)))
}

fn assert_example_matches_schema(name: &str) {
    let schema = load_json(&contracts_dir().join(format!("events/{}.v1.json", name)));
    let example = load_example(name);

    let compiled = jsonschema::JSONSchema::compile(&schema)
        .unwrap_or_else(|e| panic!("schema {} does not compile: {}", name, e));
    if let Err(errors) = compiled.validate(&example) {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        panic!("example for {} violates its schema: {:?}", name, details);
    };
}

#[test]
fn test_order_created_example_matches_schema() {
    assert_example_matches_schema("order-created");
}

#[test]
fn test_order_updated_example_matches_schema() {
    assert_example_matches_schema("order-updated");
}

#[test]
fn test_order_cancelled_example_matches_schema() {
    assert_example_matches_schema("order-cancelled");
}

#[test]
fn test_examples_decode_into_contract_types() {
    let created: OrderCreatedEvent =
        serde_json::from_value(load_example("order-created")).expect("order-created decodes");
    assert_eq!(created.customer_email, "customer@example.com");
    assert_eq!(created.total_amount, 2949.97);
    assert_eq!(created.items.len(), 2);

    let updated: OrderUpdatedEvent =
        serde_json::from_value(load_example("order-updated")).expect("order-updated decodes");
    assert_eq!(updated.status, "Processing");
    assert_eq!(updated.order_id, created.order_id);

    let cancelled: OrderCancelledEvent =
        serde_json::from_value(load_example("order-cancelled")).expect("order-cancelled decodes");
    assert_eq!(cancelled.reason, "Customer requested cancellation");
    assert_eq!(cancelled.order_id, created.order_id);
}

#[test]
fn test_examples_decode_through_the_registry() {
    let registry = order_event_registry();

    let cases = [
        ("order-created", "OrderCreatedEvent"),
        ("order-updated", "OrderUpdatedEvent"),
        ("order-cancelled", "OrderCancelledEvent"),
    ];
    for (name, discriminator) in cases {
        let bytes = serde_json::to_vec(&load_example(name)).unwrap();
        let decode = registry
            .resolve(discriminator)
            .unwrap_or_else(|| panic!("{} is not registered", discriminator));
        let event = decode(&bytes)
            .unwrap_or_else(|e| panic!("example for {} failed to decode: {}", name, e));
        assert_eq!(event.discriminator(), discriminator);
    }
}

#[test]
fn test_examples_agree_on_the_order_identity() {
    let registry = order_event_registry();
    let mut order_ids = Vec::new();

    for name in ["order-created", "order-updated", "order-cancelled"] {
        let bytes = serde_json::to_vec(&load_example(name)).unwrap();
        let event = decode_via(&registry, name, &bytes);
        order_ids.push(event.order_id());
    }

    assert!(
        order_ids.windows(2).all(|pair| pair[0] == pair[1]),
        "the examples tell one order's story: {:?}",
        order_ids
    );
}

fn decode_via(
    registry: &event_relay::EventTypeRegistry<OrderEvent>,
    name: &str,
    bytes: &[u8],
) -> OrderEvent {
    let discriminator = match name {
        "order-created" => "OrderCreatedEvent",
        "order-updated" => "OrderUpdatedEvent",
        "order-cancelled" => "OrderCancelledEvent",
        other => panic!("unknown example {}", other),
    };
    let decode = registry.resolve(discriminator).expect("registered");
    decode(bytes).expect("example decodes")
}
