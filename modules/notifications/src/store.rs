//! In-memory notification store

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::Notification;

/// Append-only in-memory notification log.
#[derive(Debug, Default)]
pub struct NotificationStore {
    notifications: RwLock<Vec<Notification>>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, notification: Notification) {
        self.notifications
            .write()
            .expect("notification store lock poisoned")
            .push(notification);
    }

    /// Flag a stored notification as delivered.
    pub fn mark_sent(&self, id: Uuid, sent_at: DateTime<Utc>) {
        let mut notifications = self
            .notifications
            .write()
            .expect("notification store lock poisoned");
        if let Some(notification) = notifications.iter_mut().find(|n| n.id == id) {
            notification.is_sent = true;
            notification.sent_at = Some(sent_at);
        }
    }

    /// Notifications recorded for one order, oldest first.
    pub fn for_order(&self, order_id: Uuid) -> Vec<Notification> {
        self.notifications
            .read()
            .expect("notification store lock poisoned")
            .iter()
            .filter(|n| n.order_id == Some(order_id))
            .cloned()
            .collect()
    }

    /// Every notification, newest first.
    pub fn all(&self) -> Vec<Notification> {
        let mut notifications = self
            .notifications
            .read()
            .expect("notification store lock poisoned")
            .clone();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(order_id: Option<Uuid>) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient_email: "customer@example.com".to_string(),
            subject: "Order Confirmation".to_string(),
            message: "Thank you for your order!".to_string(),
            notification_type: "OrderCreated".to_string(),
            order_id,
            is_sent: false,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    #[test]
    fn test_for_order_filters_by_order_id() {
        let store = NotificationStore::new();
        let order_id = Uuid::new_v4();
        store.append(notification(Some(order_id)));
        store.append(notification(Some(Uuid::new_v4())));
        store.append(notification(None));

        assert_eq!(store.for_order(order_id).len(), 1);
        assert_eq!(store.all().len(), 3);
    }

    #[test]
    fn test_mark_sent_sets_the_delivery_fields() {
        let store = NotificationStore::new();
        let entry = notification(Some(Uuid::new_v4()));
        let id = entry.id;
        store.append(entry);

        let sent_at = Utc::now();
        store.mark_sent(id, sent_at);

        let stored = &store.all()[0];
        assert!(stored.is_sent);
        assert_eq!(stored.sent_at, Some(sent_at));
    }
}
