//! Notification creation and mock delivery

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::models::Notification;
use crate::store::NotificationStore;

/// Records notifications and simulates their delivery.
pub struct NotificationService {
    store: Arc<NotificationStore>,
}

impl NotificationService {
    pub fn new(store: Arc<NotificationStore>) -> Self {
        Self { store }
    }

    /// Store a notification, then deliver it and mark it sent.
    ///
    /// Delivery is mocked; a real deployment would hand the message to an
    /// email provider here.
    pub async fn send(
        &self,
        recipient_email: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
        notification_type: impl Into<String>,
        order_id: Option<Uuid>,
    ) -> Uuid {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient_email: recipient_email.into(),
            subject: subject.into(),
            message: message.into(),
            notification_type: notification_type.into(),
            order_id,
            is_sent: false,
            created_at: Utc::now(),
            sent_at: None,
        };
        let id = notification.id;
        let recipient = notification.recipient_email.clone();
        let subject_line = notification.subject.clone();
        self.store.append(notification);

        // Mock: deliver the notification
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.store.mark_sent(id, Utc::now());

        tracing::info!(
            recipient_email = %recipient,
            subject = %subject_line,
            "Notification sent"
        );
        id
    }
}
