//! In-memory product store and transaction log

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::models::{InventoryTransaction, Product};

/// Everything the store guards: the product catalog and the audit log.
/// Both live under one lock so a multi-line reservation commits as a unit.
#[derive(Debug, Default)]
pub struct InventoryState {
    pub products: HashMap<String, Product>,
    pub transactions: Vec<InventoryTransaction>,
}

/// Shared in-memory inventory storage.
#[derive(Debug, Default)]
pub struct InventoryStore {
    state: RwLock<InventoryState>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the demo catalog.
    pub fn seed_demo_products(&self) {
        for (id, name, stock) in [
            ("LAPTOP001", "Gaming Laptop", 50),
            ("MOUSE001", "Wireless Mouse", 100),
            ("KEYBOARD001", "Mechanical Keyboard", 75),
        ] {
            self.put_product(Product::new(id, name, stock));
        }
    }

    /// Insert or replace a product under its id.
    pub fn put_product(&self, product: Product) {
        self.write().products.insert(product.id.clone(), product);
    }

    pub fn product(&self, id: &str) -> Option<Product> {
        self.read().products.get(id).cloned()
    }

    /// All products, ordered by id.
    pub fn products(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.read().products.values().cloned().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        products
    }

    /// Audit entries recorded for one order, oldest first.
    pub fn transactions_for_order(&self, order_id: Uuid) -> Vec<InventoryTransaction> {
        self.read()
            .transactions
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Read access to the whole state under one guard.
    pub fn read(&self) -> RwLockReadGuard<'_, InventoryState> {
        self.state.read().expect("inventory store lock poisoned")
    }

    /// Write access to the whole state under one guard. Mutations made
    /// through the same guard are observed together or not at all.
    pub fn write(&self) -> RwLockWriteGuard<'_, InventoryState> {
        self.state.write().expect("inventory store lock poisoned")
    }
}
