//! Alert delivery.

pub mod service;

pub use service::NotificationService;
