//! Notification domain model

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A notification composed for a customer. `notification_type` names the
/// event kind that produced it ("OrderCreated", "OrderUpdated" or
/// "OrderCancelled"); `sent_at` is set once the (mock) delivery completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_email: String,
    pub subject: String,
    pub message: String,
    pub notification_type: String,
    pub order_id: Option<Uuid>,
    pub is_sent: bool,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}
