//! Fans one event notification out to every active subscriber.
//!
//! The dispatcher reads the subscriber list once, personalizes the body for
//! each recipient, and hands every message to a [`MailTransport`] in turn.
//! Delivery failures are recorded in the returned [`BatchReport`] and never
//! interrupt the batch.
//!
//! [`MailTransport`]: crate::core::MailTransport
//! [`BatchReport`]: crate::core::BatchReport

pub mod dispatcher;

pub use dispatcher::NotificationDispatcher;
