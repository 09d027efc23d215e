//! Stock reservation and release

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{InventoryTransaction, TransactionType};
use crate::store::InventoryStore;

/// Why a reservation was refused. The store is untouched whenever one of
/// these comes back.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReserveError {
    #[error("unknown product {product_id}")]
    UnknownProduct { product_id: String },
    #[error(
        "insufficient stock for product {product_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },
}

/// Applies order lifecycle effects to the inventory store.
pub struct InventoryService {
    store: Arc<InventoryStore>,
}

impl InventoryService {
    pub fn new(store: Arc<InventoryStore>) -> Self {
        Self { store }
    }

    /// Reserve stock for every `(product id, quantity)` line of an order,
    /// or for none of them.
    ///
    /// Every line is validated before anything is mutated, and the whole
    /// reservation lands under a single write guard. A line that fails
    /// validation therefore leaves the catalog and the audit log exactly as
    /// they were, which keeps redelivered orders safe to retry.
    pub fn reserve(&self, order_id: Uuid, lines: &[(String, i64)]) -> Result<(), ReserveError> {
        let mut state = self.store.write();

        for (product_id, quantity) in lines {
            let Some(product) = state.products.get(product_id) else {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    "Product not found for reservation"
                );
                return Err(ReserveError::UnknownProduct {
                    product_id: product_id.clone(),
                });
            };
            if product.available() < *quantity {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    available = product.available(),
                    requested = quantity,
                    "Insufficient stock for reservation"
                );
                return Err(ReserveError::InsufficientStock {
                    product_id: product_id.clone(),
                    available: product.available(),
                    requested: *quantity,
                });
            }
        }

        let now = Utc::now();
        for (product_id, quantity) in lines {
            let product = state
                .products
                .get_mut(product_id)
                .expect("validated above under the same guard");
            product.reserved_quantity += quantity;
            product.last_updated = now;

            state.transactions.push(InventoryTransaction {
                id: Uuid::new_v4(),
                product_id: product_id.clone(),
                transaction_type: TransactionType::Reserve,
                quantity: *quantity,
                order_id,
                reason: format!("Reserved for order {}", order_id),
                created_at: now,
            });
        }

        tracing::info!(order_id = %order_id, lines = lines.len(), "Reserved inventory for order");
        Ok(())
    }

    /// Release previously reserved stock after a cancellation.
    ///
    /// Reservations never drop below zero, and lines naming a product this
    /// store has never seen are skipped with a log instead of failing the
    /// release of the rest.
    pub fn release(&self, order_id: Uuid, lines: &[(String, i64)]) {
        let mut state = self.store.write();
        let now = Utc::now();

        for (product_id, quantity) in lines {
            let Some(product) = state.products.get_mut(product_id) else {
                tracing::warn!(
                    order_id = %order_id,
                    product_id = %product_id,
                    "Skipping release for unknown product"
                );
                continue;
            };
            product.reserved_quantity = (product.reserved_quantity - quantity).max(0);
            product.last_updated = now;

            state.transactions.push(InventoryTransaction {
                id: Uuid::new_v4(),
                product_id: product_id.clone(),
                transaction_type: TransactionType::Release,
                quantity: *quantity,
                order_id,
                reason: format!("Released from cancelled order {}", order_id),
                created_at: now,
            });
        }

        tracing::info!(order_id = %order_id, "Released inventory for order");
    }
}
