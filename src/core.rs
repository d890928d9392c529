//! Core domain types and service traits for the notifier
//!
//! This module defines the values that flow between the subscriber store,
//! the notification dispatcher and the mail transport, and the trait
//! contracts that decouple those components from each other.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A notification recipient, as held by the external record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Subscriber {
    /// The address notifications are delivered to
    pub email: String,
    /// Display name used in the greeting line
    pub name: String,
    /// Only active subscribers receive notifications
    pub active: bool,
}

impl Subscriber {
    /// Creates an active subscriber.
    pub fn active(email: &str, name: &str) -> Self {
        Self {
            email: email.to_string(),
            name: name.to_string(),
            active: true,
        }
    }
}

/// A single event notification, built by the caller and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notification {
    pub subject: String,
    /// Event text shared by every recipient; the dispatcher wraps it with a
    /// per-subscriber greeting and the platform footer.
    pub body_template: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body_template: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body_template: body_template.into(),
        }
    }
}

/// The result of one delivery attempt to one recipient.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub success: bool,
    /// Human-readable reason for a failure, or the final server reply on success
    pub diagnostic: String,
}

impl DeliveryOutcome {
    pub fn delivered(recipient: &str) -> Self {
        Self {
            recipient: recipient.to_string(),
            success: true,
            diagnostic: "delivered".to_string(),
        }
    }

    pub fn failed(recipient: &str, diagnostic: impl Into<String>) -> Self {
        Self {
            recipient: recipient.to_string(),
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Per-recipient outcomes of one notification batch, in delivery order.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl BatchReport {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, outcome: DeliveryOutcome) {
        self.outcomes.push(outcome);
    }

    /// Number of delivery attempts made.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.delivered()
    }

    /// Returns the outcomes that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Read-only access to the subscriber list owned by the record store
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Returns every subscriber currently flagged active, in store order
    ///
    /// # Returns
    /// * `Ok(Vec<Subscriber>)`, possibly empty
    /// * `Err` if the store could not be queried
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>>;
}

/// Delivers a single plain-text message to a single recipient
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Attempts one delivery. Implementations never panic or return an
    /// error; failures are reported through the outcome.
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> DeliveryOutcome;
}
