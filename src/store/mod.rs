//! Read-only views of the subscriber list.

pub mod csv_store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::SubscriberStore;
pub use csv_store::CsvSubscriberStore;
