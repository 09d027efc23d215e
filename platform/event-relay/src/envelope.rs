//! Wire envelope and the event capability set carried by every domain event

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Capability set every publishable domain event exposes.
///
/// The discriminator is the schema's own name (e.g. `"OrderCreatedEvent"`);
/// it travels as the wire `type` metadata and is the sole input to
/// [`routing_key`]. Publishers read it from the type, so no registry lookup
/// happens at publish time; consumers always resolve it through the
/// registry so unknown producers cannot crash them.
pub trait DomainEvent {
    /// Wire discriminator identifying this event's shape.
    const DISCRIMINATOR: &'static str;

    /// Unique per logical occurrence; redeliveries keep the same id.
    fn event_id(&self) -> Uuid;

    /// UTC creation time, immutable.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Positive schema version; newer versions must still decode.
    fn schema_version(&self) -> u32;
}

/// The transmitted wrapper around one event occurrence.
///
/// Envelopes exist only between `publish` and the settle of the delivery
/// that carried them; they are never stored by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Event discriminator, carried as the wire `type` metadata.
    pub discriminator: String,
    /// `event_id` in string form, carried as the wire `message-id`.
    pub message_id: String,
    /// `occurred_at` truncated to whole-second Unix time.
    pub timestamp: u64,
    /// JSON-encoded payload, camelCase field names.
    pub body: Vec<u8>,
}

impl Envelope {
    /// Seal a typed event into its wire form.
    pub fn seal<E>(event: &E) -> Result<Self, serde_json::Error>
    where
        E: DomainEvent + Serialize,
    {
        Ok(Self {
            discriminator: E::DISCRIMINATOR.to_string(),
            message_id: event.event_id().to_string(),
            timestamp: event.occurred_at().timestamp().max(0) as u64,
            body: serde_json::to_vec(event)?,
        })
    }
}

/// Routing key for a discriminator: lower-cased, trailing `"event"` stripped.
///
/// Pure and deterministic: publisher and consumer both derive their keys
/// from it, so they never need a shared constants table.
///
/// ```rust
/// assert_eq!(event_relay::routing_key("OrderCreatedEvent"), "ordercreated");
/// ```
pub fn routing_key(discriminator: &str) -> String {
    let lowered = discriminator.to_lowercase();
    match lowered.strip_suffix("event") {
        Some(stripped) => stripped.to_string(),
        None => lowered,
    }
}
