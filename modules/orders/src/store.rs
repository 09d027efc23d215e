//! In-memory order store

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::Order;

/// Keyed in-memory store, shared behind an `Arc` between the service and
/// anything else that wants to read order state.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an order under its id.
    pub fn save(&self, order: Order) {
        self.orders
            .write()
            .expect("order store lock poisoned")
            .insert(order.id, order);
    }

    pub fn get(&self, id: Uuid) -> Option<Order> {
        self.orders
            .read()
            .expect("order store lock poisoned")
            .get(&id)
            .cloned()
    }

    /// All orders, newest first.
    pub fn all(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .expect("order store lock poisoned")
            .values()
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn order_created_at(offset_secs: i64, email: &str) -> Order {
        let created_at = Utc::now() + Duration::seconds(offset_secs);
        Order {
            id: Uuid::new_v4(),
            customer_email: email.to_string(),
            total_amount: 10.0,
            status: "Pending".to_string(),
            created_at,
            updated_at: created_at,
            items: Vec::new(),
        }
    }

    #[test]
    fn test_save_replaces_by_id() {
        let store = OrderStore::new();
        let mut order = order_created_at(0, "customer@example.com");
        store.save(order.clone());

        order.status = "Processing".to_string();
        store.save(order.clone());

        let stored = store.get(order.id).expect("order should exist");
        assert_eq!(stored.status, "Processing");
        assert_eq!(store.all().len(), 1);
    }

    #[test]
    fn test_all_returns_newest_first() {
        let store = OrderStore::new();
        store.save(order_created_at(0, "first@example.com"));
        store.save(order_created_at(5, "second@example.com"));

        let all = store.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].customer_email, "second@example.com");
        assert_eq!(all[1].customer_email, "first@example.com");
    }

    #[test]
    fn test_get_unknown_id_is_none() {
        let store = OrderStore::new();
        assert!(store.get(Uuid::new_v4()).is_none());
    }
}
