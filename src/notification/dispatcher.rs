use crate::config::NotifierConfig;
use crate::core::{BatchReport, MailTransport, Notification, SubscriberStore};
use crate::events::{EmergencyAlert, SensorReading};
use crate::formatting::{BodyFormatter, GreetingFormatter};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Sends one notification to every active subscriber, one after another.
pub struct NotificationDispatcher {
    store: Arc<dyn SubscriberStore>,
    transport: Arc<dyn MailTransport>,
    formatter: Box<dyn BodyFormatter>,
    brand: String,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn SubscriberStore>,
        transport: Arc<dyn MailTransport>,
        config: NotifierConfig,
    ) -> Self {
        Self {
            store,
            transport,
            formatter: Box::new(GreetingFormatter::new(&config)),
            brand: config.brand,
        }
    }

    /// Replaces the default greeting/footer layout.
    pub fn with_formatter(mut self, formatter: Box<dyn BodyFormatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Delivers `notification` to each active subscriber in store order.
    ///
    /// A store error is logged and treated as an empty list. Individual
    /// delivery failures are logged and reported but never stop the batch.
    #[instrument(skip_all, fields(subject = %notification.subject))]
    pub async fn notify_all(&self, notification: &Notification) -> BatchReport {
        let subscribers = match self.store.active_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!(error = %e, "Subscriber lookup failed; no notifications sent");
                metrics::counter!("notification_batches_total", "status" => "store_error")
                    .increment(1);
                return BatchReport::default();
            }
        };

        if subscribers.is_empty() {
            info!("No active subscribers; nothing to send");
            return BatchReport::default();
        }

        let mut report = BatchReport::with_capacity(subscribers.len());
        for subscriber in subscribers.iter().filter(|s| s.active) {
            let body = self
                .formatter
                .personalize(subscriber, &notification.body_template);
            let outcome = self
                .transport
                .deliver(&subscriber.email, &notification.subject, &body)
                .await;

            if outcome.success {
                info!(recipient = %outcome.recipient, "Notification delivered");
            } else {
                warn!(
                    recipient = %outcome.recipient,
                    reason = %outcome.diagnostic,
                    "Notification not delivered"
                );
            }
            report.push(outcome);
        }

        metrics::counter!("notification_batches_total", "status" => "completed").increment(1);
        info!(
            attempted = report.attempted(),
            delivered = report.delivered(),
            failed = report.failed(),
            "Notification batch finished"
        );
        report
    }

    pub async fn notify_sensor_reading(&self, reading: &SensorReading) -> BatchReport {
        self.notify_all(&reading.to_notification(&self.brand)).await
    }

    pub async fn notify_emergency_alert(&self, alert: &EmergencyAlert) -> BatchReport {
        self.notify_all(&alert.to_notification(&self.brand)).await
    }
}
