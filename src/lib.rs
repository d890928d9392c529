/// AgroPan Notifier - outbound email notifications for the AgroPan platform
///
/// This library provides a minimal SMTP client (STARTTLS, implicit TLS and
/// AUTH LOGIN) and a dispatcher that fans a sensor-data or emergency-alert
/// notification out to every active subscriber.
pub mod cli;
pub mod config;
pub mod core;
pub mod events;
pub mod formatting;
pub mod notification;
pub mod smtp;
pub mod store;

// Re-export core types for convenience
pub use core::*;
