//! A subscriber store backed by a CSV export of the `emails` table.

use crate::core::{Subscriber, SubscriberStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, instrument};

/// Reads subscribers from a headered CSV file with `email`, `name` and
/// (optionally) `is_active` columns.
///
/// The file is re-read on every lookup, so edits are picked up by the next
/// notification batch.
#[derive(Debug, Clone)]
pub struct CsvSubscriberStore {
    path: PathBuf,
}

impl CsvSubscriberStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads every row, active or not, in file order.
    pub fn load_all(path: &Path) -> Result<Vec<Subscriber>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("failed to open subscriber list {:?}", path))?;

        let mut subscribers = Vec::new();
        for result in reader.deserialize() {
            let row: CsvRow =
                result.with_context(|| format!("malformed row in {:?}", path))?;
            subscribers.push(Subscriber {
                email: row.email,
                name: row.name,
                active: row.is_active,
            });
        }
        Ok(subscribers)
    }
}

#[async_trait]
impl SubscriberStore for CsvSubscriberStore {
    #[instrument(skip(self), fields(path = ?self.path))]
    async fn active_subscribers(&self) -> Result<Vec<Subscriber>> {
        let path = self.path.clone();
        let all = task::spawn_blocking(move || Self::load_all(&path)).await??;
        let total = all.len();
        let active: Vec<Subscriber> = all.into_iter().filter(|s| s.active).collect();
        debug!(total, active = active.len(), "Loaded subscriber list");
        Ok(active)
    }
}

/// A helper struct for deserializing a row from the CSV file using the `csv` crate.
#[derive(Debug, Deserialize)]
struct CsvRow {
    email: String,
    name: String,
    #[serde(default = "default_active", deserialize_with = "deserialize_flag")]
    is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Accepts the flag spellings found in database exports: `1`/`0`,
/// `true`/`false`, `yes`/`no`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid is_active value {:?}",
            other
        ))),
    }
}
