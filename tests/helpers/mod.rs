#![allow(dead_code)]

pub mod mock_smtp;

use agropan_notifier::config::SmtpConfig;
use agropan_notifier::smtp::SecurityMode;

/// SMTP settings pointing at a local plaintext mock server.
pub fn plain_smtp_config(port: u16) -> SmtpConfig {
    SmtpConfig {
        host: "127.0.0.1".to_string(),
        port,
        security: Some(SecurityMode::Plain),
        ehlo_hostname: Some("client.test".to_string()),
        connect_timeout_ms: 2_000,
        io_timeout_ms: 2_000,
        ..SmtpConfig::default()
    }
}
