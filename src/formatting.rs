// src/formatting.rs

use crate::config::NotifierConfig;
use crate::core::Subscriber;

/// Wraps an event body with a per-subscriber greeting and the platform footer.
pub trait BodyFormatter: Send + Sync {
    fn personalize(&self, subscriber: &Subscriber, template: &str) -> String;
}

/// The plain-text layout used for all email notifications:
///
/// ```text
/// Hello {name},
///
/// {template}
///
/// ---
/// {platform name}
/// To unsubscribe, contact {contact}
/// ```
pub struct GreetingFormatter {
    platform_name: String,
    unsubscribe_contact: String,
}

impl GreetingFormatter {
    pub fn new(config: &NotifierConfig) -> Self {
        Self {
            platform_name: config.platform_name.clone(),
            unsubscribe_contact: config.unsubscribe_contact.clone(),
        }
    }

    /// The fixed footer appended to every body.
    pub fn footer(&self) -> String {
        format!(
            "---\n{}\nTo unsubscribe, contact {}",
            self.platform_name, self.unsubscribe_contact
        )
    }
}

impl BodyFormatter for GreetingFormatter {
    fn personalize(&self, subscriber: &Subscriber, template: &str) -> String {
        format!(
            "Hello {},\n\n{}\n\n{}",
            subscriber.name.trim(),
            template,
            self.footer()
        )
    }
}
