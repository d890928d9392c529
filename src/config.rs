//! Configuration management for the notifier
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer built-in defaults, an `agropan.toml` file, `AGROPAN_`
//! environment variables and command-line overrides.

use crate::cli::Cli;
use crate::smtp::SecurityMode;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "agropan.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Connection and sender settings for the SMTP server.
    pub smtp: SmtpConfig,
    /// Branding and footer used when building notifications.
    pub notifier: NotifierConfig,
    /// Where the subscriber list is read from.
    pub store: StoreConfig,
}

/// Connection and sender settings for the SMTP server.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    /// 465 selects implicit TLS, 587 selects STARTTLS, anything else is plaintext.
    pub port: u16,
    /// `AUTH LOGIN` is skipped unless both username and password are set.
    pub username: Option<String>,
    pub password: Option<String>,
    /// The envelope sender and `From` address.
    pub from_address: String,
    /// The `From` display name.
    pub from_name: String,
    pub reply_to: Option<String>,
    /// Name announced in `EHLO`; defaults to the machine's hostname.
    pub ehlo_hostname: Option<String>,
    /// Overrides the port-derived security mode.
    pub security: Option<SecurityMode>,
    /// Accept any server certificate and hostname. Needed for servers with
    /// self-signed certificates; leaves the connection open to interception.
    pub insecure_skip_verify: bool,
    /// Deadline for the TCP connect and for the TLS handshake.
    pub connect_timeout_ms: u64,
    /// Deadline for each write and for each reply line read.
    pub io_timeout_ms: u64,
}

impl SmtpConfig {
    pub fn security_mode(&self) -> SecurityMode {
        self.security
            .unwrap_or_else(|| SecurityMode::from_port(self.port))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Branding and footer used when building notifications.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NotifierConfig {
    /// Short name used in subject lines.
    pub brand: String,
    /// Full platform name printed in the footer.
    pub platform_name: String,
    /// Address subscribers are told to contact to unsubscribe.
    pub unsubscribe_contact: String,
}

/// Where the subscriber list is read from.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// CSV file with `email,name,is_active` columns.
    pub subscribers_path: PathBuf,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources, lowest precedence first: defaults, the TOML file named by
    /// `--config` (or `agropan.toml`), `AGROPAN_` environment variables with
    /// `__` separating nested keys (e.g. `AGROPAN_SMTP__PASSWORD`), and
    /// finally command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("AGROPAN_").split("__"))
            .merge(cli)
            .extract()?;
        Ok(config)
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            from_address: "noreply@agropan.com".to_string(),
            from_name: "AgroPan Alerts".to_string(),
            reply_to: Some("noreply@agropan.com".to_string()),
            ehlo_hostname: None,
            security: None,
            insecure_skip_verify: false,
            connect_timeout_ms: 15_000,
            io_timeout_ms: 15_000,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            brand: "AgroPan".to_string(),
            platform_name: "AgroPan — Nepal's Smart Agriculture Platform".to_string(),
            unsubscribe_contact: "admin@agropan.com".to_string(),
        }
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            smtp: SmtpConfig::default(),
            notifier: NotifierConfig::default(),
            store: StoreConfig {
                subscribers_path: PathBuf::from("subscribers.csv"),
            },
        }
    }
}
