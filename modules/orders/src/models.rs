//! Order domain model

use chrono::{DateTime, Utc};
use order_contracts::OrderItem;
use uuid::Uuid;

/// One line on an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: f64,
}

impl OrderLine {
    /// Quantity times unit price.
    pub fn line_total(&self) -> f64 {
        f64::from(self.quantity) * self.unit_price
    }
}

impl From<&OrderLine> for OrderItem {
    fn from(line: &OrderLine) -> Self {
        OrderItem {
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// An order as this service tracks it. `total_amount` is derived from the
/// lines at creation and never recomputed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub customer_email: String,
    pub total_amount: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderLine>,
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_email: String,
    pub items: Vec<OrderLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total_multiplies_quantity_by_unit_price() {
        let line = OrderLine {
            product_id: "MOUSE001".to_string(),
            product_name: "Wireless Mouse".to_string(),
            quantity: 3,
            unit_price: 24.99,
        };
        assert!((line.line_total() - 74.97).abs() < 1e-9);
    }
}
