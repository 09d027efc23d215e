//! Inventory domain model

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A stocked product. Reservations hold stock without consuming it, so
/// `stock_quantity` only moves on receipt or shipment (neither of which this
/// demo performs).
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub stock_quantity: i64,
    pub reserved_quantity: i64,
    pub last_updated: DateTime<Utc>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, stock_quantity: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stock_quantity,
            reserved_quantity: 0,
            last_updated: Utc::now(),
        }
    }

    /// Stock not currently held by a reservation.
    pub fn available(&self) -> i64 {
        self.stock_quantity - self.reserved_quantity
    }
}

/// Direction of one stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Reserve,
    Release,
}

/// One entry in the append-only inventory audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryTransaction {
    pub id: Uuid,
    pub product_id: String,
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub order_id: Uuid,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_subtracts_reservations() {
        let mut product = Product::new("LAPTOP001", "Gaming Laptop", 50);
        assert_eq!(product.available(), 50);

        product.reserved_quantity = 8;
        assert_eq!(product.available(), 42);
    }
}
