//! Discriminator → decoder registry for a closed set of event kinds

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::envelope::{routing_key, DomainEvent};

/// Decodes a JSON payload into the application's event union.
pub type DecodeFn<E> = Arc<dyn Fn(&[u8]) -> Result<E, serde_json::Error> + Send + Sync>;

/// Maps wire discriminators to payload decoders.
///
/// `E` is the application's closed event union (one variant per event kind),
/// so the set of decodable events is fixed at build time and dispatch on the
/// decoded value is an exhaustive `match`, never a runtime type lookup.
///
/// The registry also knows the queue bindings a consumer needs: one routing
/// key per registered discriminator.
pub struct EventTypeRegistry<E> {
    decoders: HashMap<String, DecodeFn<E>>,
}

impl<E> EventTypeRegistry<E> {
    pub fn new() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder for `discriminator`.
    ///
    /// Re-registering the same discriminator overwrites the previous decoder
    /// (last registration wins), which is how tests substitute doubles.
    pub fn register<F>(&mut self, discriminator: &str, decode: F)
    where
        F: Fn(&[u8]) -> Result<E, serde_json::Error> + Send + Sync + 'static,
    {
        self.decoders
            .insert(discriminator.to_string(), Arc::new(decode));
    }

    /// Register an event type's serde decoder under its own discriminator.
    pub fn register_type<T>(&mut self)
    where
        T: DomainEvent + DeserializeOwned + Into<E> + 'static,
    {
        self.register(T::DISCRIMINATOR, |bytes| {
            serde_json::from_slice::<T>(bytes).map(Into::into)
        });
    }

    /// Look up the decoder for a wire discriminator.
    ///
    /// `None` means the discriminator is unknown here, which is expected
    /// while differently-versioned producers and consumers coexist.
    pub fn resolve(&self, discriminator: &str) -> Option<DecodeFn<E>> {
        self.decoders.get(discriminator).cloned()
    }

    /// Routing keys for every registered discriminator, sorted and deduped.
    ///
    /// A consumer binds its queue on exactly this set.
    pub fn routing_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.decoders.keys().map(|d| routing_key(d)).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl<E> Default for EventTypeRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventTypeRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut discriminators: Vec<&str> = self.decoders.keys().map(String::as_str).collect();
        discriminators.sort_unstable();
        f.debug_struct("EventTypeRegistry")
            .field("discriminators", &discriminators)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ShelfStockedEvent {
        event_id: Uuid,
        occurred_at: DateTime<Utc>,
        #[serde(rename = "version")]
        schema_version: u32,
        shelf: String,
    }

    impl DomainEvent for ShelfStockedEvent {
        const DISCRIMINATOR: &'static str = "ShelfStockedEvent";

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

    #[derive(Debug, Clone, PartialEq)]
    enum ShopEvent {
        ShelfStocked(ShelfStockedEvent),
        Probe(u32),
    }

    impl From<ShelfStockedEvent> for ShopEvent {
        fn from(event: ShelfStockedEvent) -> Self {
            ShopEvent::ShelfStocked(event)
        }
    }

    #[test]
    fn test_resolve_unknown_discriminator_is_none() {
        let registry: EventTypeRegistry<ShopEvent> = EventTypeRegistry::new();
        assert!(registry.resolve("NeverRegisteredEvent").is_none());
    }

    #[test]
    fn test_register_type_decodes_through_the_union() {
        let mut registry: EventTypeRegistry<ShopEvent> = EventTypeRegistry::new();
        registry.register_type::<ShelfStockedEvent>();

        let payload = serde_json::json!({
            "eventId": Uuid::new_v4(),
            "occurredAt": Utc::now(),
            "version": 1,
            "shelf": "A-12"
        });
        let decode = registry.resolve("ShelfStockedEvent").expect("registered");
        let event = decode(&serde_json::to_vec(&payload).unwrap()).expect("valid payload");

        match event {
            ShopEvent::ShelfStocked(inner) => assert_eq!(inner.shelf, "A-12"),
            other => panic!("decoded into the wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry: EventTypeRegistry<ShopEvent> = EventTypeRegistry::new();
        registry.register("ShelfStockedEvent", |_| Ok(ShopEvent::Probe(1)));
        registry.register("ShelfStockedEvent", |_| Ok(ShopEvent::Probe(2)));

        let decode = registry.resolve("ShelfStockedEvent").expect("registered");
        assert_eq!(decode(b"{}").unwrap(), ShopEvent::Probe(2));
    }

    #[test]
    fn test_routing_keys_are_sorted_and_deduped() {
        let mut registry: EventTypeRegistry<ShopEvent> = EventTypeRegistry::new();
        registry.register("ShelfStockedEvent", |_| Ok(ShopEvent::Probe(0)));
        registry.register("ShelfRestockedEvent", |_| Ok(ShopEvent::Probe(0)));
        // Same routing key as ShelfStockedEvent once the suffix is stripped
        registry.register("ShelfStocked", |_| Ok(ShopEvent::Probe(0)));

        assert_eq!(registry.routing_keys(), vec!["shelfrestocked", "shelfstocked"]);
    }
}
