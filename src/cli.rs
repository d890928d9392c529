//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `agropan.toml` file and environment variables.

use crate::events::{EmergencyAlert, SensorReading};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Emails every active AgroPan subscriber about a new sensor reading or
/// emergency alert.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SMTP server host.
    #[arg(long, value_name = "HOST")]
    pub smtp_host: Option<String>,

    /// SMTP server port (465 = implicit TLS, 587 = STARTTLS).
    #[arg(long, value_name = "PORT")]
    pub smtp_port: Option<u16>,

    /// CSV file holding the subscriber list.
    #[arg(long, value_name = "FILE")]
    pub subscribers: Option<PathBuf>,

    /// Logging level (e.g. "debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Print the delivery report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// The event to notify subscribers about.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// A new sensor reading was recorded.
    Sensor(SensorArgs),
    /// A new emergency alert was issued.
    Alert(AlertArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SensorArgs {
    /// Device that produced the reading.
    #[arg(long)]
    pub device: String,
    /// Temperature in °C.
    #[arg(long)]
    pub temperature: String,
    /// Soil moisture in %.
    #[arg(long)]
    pub moisture: String,
    /// Relative humidity in %.
    #[arg(long)]
    pub humidity: String,
    /// Gas concentration in ppm.
    #[arg(long)]
    pub gases: String,
    /// Nitrogen in mg/kg.
    #[arg(long)]
    pub nitrogen: String,
    /// When the reading was taken; defaults to now.
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct AlertArgs {
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub details: String,
    /// When the alert was issued; defaults to now.
    #[arg(long)]
    pub timestamp: Option<String>,
    /// End of the alert's validity period.
    #[arg(long)]
    pub valid_till: String,
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl From<SensorArgs> for SensorReading {
    fn from(args: SensorArgs) -> Self {
        Self {
            timestamp: args.timestamp.unwrap_or_else(now),
            temperature: args.temperature,
            moisture: args.moisture,
            humidity: args.humidity,
            gases: args.gases,
            nitrogen: args.nitrogen,
            device: args.device,
        }
    }
}

impl From<AlertArgs> for EmergencyAlert {
    fn from(args: AlertArgs) -> Self {
        Self {
            title: args.title,
            details: args.details,
            timestamp: args.timestamp.unwrap_or_else(now),
            valid_till: args.valid_till,
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut smtp = Dict::new();
        if let Some(host) = &self.smtp_host {
            smtp.insert("host".into(), Value::from(host.clone()));
        }
        if let Some(port) = self.smtp_port {
            smtp.insert("port".into(), Value::from(port as u64));
        }
        if !smtp.is_empty() {
            dict.insert("smtp".into(), Value::from(smtp));
        }

        if let Some(path) = &self.subscribers {
            let mut store = Dict::new();
            store.insert(
                "subscribers_path".into(),
                Value::from(path.display().to_string()),
            );
            dict.insert("store".into(), Value::from(store));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
