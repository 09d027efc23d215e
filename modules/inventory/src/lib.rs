pub mod handlers;
pub mod models;
pub mod service;
pub mod store;

pub use models::{InventoryTransaction, Product, TransactionType};
pub use service::{InventoryService, ReserveError};
pub use store::InventoryStore;
