//! Platform events that trigger subscriber notifications.
//!
//! A new sensor reading and a new emergency alert each turn into one
//! [`Notification`] with a fixed subject and body layout.

use crate::core::Notification;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// A reading reported by an IoT field device. Values are kept as the device
/// reported them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SensorReading {
    pub timestamp: String,
    pub temperature: String,
    pub moisture: String,
    pub humidity: String,
    pub gases: String,
    pub nitrogen: String,
    pub device: String,
}

impl SensorReading {
    /// Checks that every field is present and non-blank.
    pub fn validate(&self) -> Result<(), EventError> {
        require(&[
            ("timestamp", &self.timestamp),
            ("temperature", &self.temperature),
            ("moisture", &self.moisture),
            ("humidity", &self.humidity),
            ("gases", &self.gases),
            ("nitrogen", &self.nitrogen),
            ("device", &self.device),
        ])
    }

    pub fn to_notification(&self, brand: &str) -> Notification {
        let body = format!(
            "New sensor data has been recorded:\n\n\
             Device      : {}\n\
             Temperature : {} °C\n\
             Moisture    : {} %\n\
             Humidity    : {} %\n\
             Gases       : {} ppm\n\
             Nitrogen    : {} mg/kg\n\
             Timestamp   : {}",
            self.device,
            self.temperature,
            self.moisture,
            self.humidity,
            self.gases,
            self.nitrogen,
            self.timestamp,
        );
        Notification::new(format!("{} — New Sensor Data Received", brand), body)
    }
}

/// An emergency alert issued by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EmergencyAlert {
    pub title: String,
    pub details: String,
    /// When the alert was issued
    pub timestamp: String,
    pub valid_till: String,
}

impl EmergencyAlert {
    pub fn validate(&self) -> Result<(), EventError> {
        require(&[
            ("title", &self.title),
            ("details", &self.details),
            ("timestamp", &self.timestamp),
            ("valid_till", &self.valid_till),
        ])
    }

    pub fn to_notification(&self, brand: &str) -> Notification {
        let body = format!(
            "An emergency alert has been issued:\n\n\
             Title      : {}\n\
             Details    : {}\n\
             Issued at  : {}\n\
             Valid till : {}",
            self.title, self.details, self.timestamp, self.valid_till,
        );
        Notification::new(
            format!("⚠️ {} Emergency Alert — {}", brand, self.title),
            body,
        )
    }
}

fn require(fields: &[(&'static str, &String)]) -> Result<(), EventError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(EventError::MissingField(*name)),
        None => Ok(()),
    }
}
