pub mod handlers;
pub mod models;
pub mod service;
pub mod store;

pub use models::Notification;
pub use service::NotificationService;
pub use store::NotificationStore;
