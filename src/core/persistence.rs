use crate::domain::ports::KeyValueStore;
use crate::utils::error::{Result, WatchError};
use crate::utils::logger::report_error;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

pub const CURRENT_POSTCODE_KEY: &str = "currentPostcode";
pub const POSTCODE_RESULTS_KEY: &str = "postcodeResults";
pub const SUBSCRIBED_POSTCODES_KEY: &str = "subscribedPostcodes";
pub const CHECK_FREQUENCY_KEY: &str = "checkFrequency";
pub const NOTIFICATION_PERMISSION_KEY: &str = "notificationPermission";

/// JSON layer over a [`KeyValueStore`].
///
/// Writes are best-effort: a failure is logged and reported, then handed back
/// to the caller as a value so it can decide whether to care. Reads never fail;
/// a missing key and an undecodable value both come back as `None`.
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let outcome = serde_json::to_string(value)
            .map_err(WatchError::from)
            .and_then(|serialized| self.store.set_item(key, &serialized))
            .map_err(|e| persistence_failed(key, e));

        if let Err(e) = &outcome {
            report_error("Error saving to storage", e);
        }
        outcome
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_load(key) {
            Ok(value) => value,
            Err(e) => {
                report_error("Error getting from storage", &e);
                None
            }
        }
    }

    /// Like [`Persistence::load`] but surfaces decode and store errors.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = self
            .store
            .get_item(key)
            .map_err(|e| persistence_failed(key, e))?;

        match raw {
            Some(serialized) if !serialized.is_empty() => serde_json::from_str(&serialized)
                .map(Some)
                .map_err(|e| persistence_failed(key, e)),
            _ => Ok(None),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let outcome = self
            .store
            .remove_item(key)
            .map_err(|e| persistence_failed(key, e));

        if let Err(e) = &outcome {
            report_error("Error removing from storage", e);
        }
        outcome
    }
}

fn persistence_failed(key: &str, err: impl std::fmt::Display) -> WatchError {
    WatchError::PersistenceFailed {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
