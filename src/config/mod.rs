#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};

use crate::adapters::source::{DEFAULT_LATENCY, DEFAULT_WIN_PROBABILITY};
use crate::domain::model::DEFAULT_POSTCODE;
use crate::domain::ports::{ConfigProvider, SourceKind};
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_postcode, validate_range,
    validate_required_field, validate_url, Validate,
};
use std::time::Duration;
use toml_config::TomlConfig;

pub const DEFAULT_STORE_PATH: &str = ".postcode-watch/store.json";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Fully resolved settings: CLI flags over the TOML file over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub store_path: String,
    pub source_kind: SourceKind,
    pub endpoint: Option<String>,
    pub fetch_timeout_secs: u64,
    pub simulated_latency_ms: u64,
    pub win_probability: f64,
    pub sample_postcode: String,
    pub notification_icon: Option<String>,
    pub notification_badge: Option<String>,
    pub force_notifications: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: DEFAULT_STORE_PATH.to_string(),
            source_kind: SourceKind::Simulated,
            endpoint: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            simulated_latency_ms: DEFAULT_LATENCY.as_millis() as u64,
            win_probability: DEFAULT_WIN_PROBABILITY,
            sample_postcode: DEFAULT_POSTCODE.to_string(),
            notification_icon: None,
            notification_badge: None,
            force_notifications: false,
        }
    }
}

impl Settings {
    pub fn from_toml(config: TomlConfig) -> Self {
        let defaults = Self::default();
        let TomlConfig {
            storage,
            source,
            notifications,
        } = config;

        Self {
            store_path: storage.path.unwrap_or(defaults.store_path),
            source_kind: source.kind.unwrap_or(defaults.source_kind),
            endpoint: source.endpoint,
            fetch_timeout_secs: source
                .timeout_seconds
                .unwrap_or(defaults.fetch_timeout_secs),
            simulated_latency_ms: source
                .latency_ms
                .unwrap_or(defaults.simulated_latency_ms),
            win_probability: source.win_probability.unwrap_or(defaults.win_probability),
            sample_postcode: source
                .sample_postcode
                .unwrap_or(defaults.sample_postcode),
            notification_icon: notifications.icon,
            notification_badge: notifications.badge,
            force_notifications: notifications.force_supported.unwrap_or(false),
        }
    }
}

impl ConfigProvider for Settings {
    fn store_path(&self) -> &str {
        &self.store_path
    }

    fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    fn win_probability(&self) -> f64 {
        self.win_probability
    }

    fn sample_postcode(&self) -> &str {
        &self.sample_postcode
    }

    fn notification_icon(&self) -> Option<&str> {
        self.notification_icon.as_deref()
    }

    fn notification_badge(&self) -> Option<&str> {
        self.notification_badge.as_deref()
    }

    fn force_notifications(&self) -> bool {
        self.force_notifications
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        validate_path("storage.path", &self.store_path)?;
        validate_positive_number("source.timeout_seconds", self.fetch_timeout_secs, 1)?;
        validate_range("source.win_probability", self.win_probability, 0.0, 1.0)?;
        validate_postcode(&self.sample_postcode)?;

        if self.source_kind == SourceKind::Http {
            let endpoint = validate_required_field("source.endpoint", &self.endpoint)?;
            validate_url("source.endpoint", endpoint)?;
        }
        Ok(())
    }
}
