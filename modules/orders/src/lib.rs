pub mod models;
pub mod service;
pub mod store;

pub use models::{CreateOrderRequest, Order, OrderLine};
pub use service::OrderService;
pub use store::OrderStore;
