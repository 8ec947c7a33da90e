use crate::domain::model::{
    LotteryOutcome, NotificationId, NotificationOptions, Permission, PostalCode,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Synchronous string-keyed store, the durability boundary of the app.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&self, key: &str) -> Result<()>;
}

/// Where lottery outcomes come from. Swappable without touching callers.
#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn lookup(&self, postcode: &PostalCode) -> Result<LotteryOutcome>;
}

#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    fn is_supported(&self) -> bool;
    fn permission(&self) -> Permission;
    async fn request_permission(&self) -> Result<Permission>;
    fn show(&self, title: &str, options: &NotificationOptions) -> Result<NotificationId>;
    fn focus_app(&self);
    fn close(&self, id: NotificationId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Simulated,
    Http,
}

pub trait ConfigProvider: Send + Sync {
    fn store_path(&self) -> &str;
    fn source_kind(&self) -> SourceKind;
    fn endpoint(&self) -> Option<&str>;
    fn fetch_timeout(&self) -> Duration;
    fn simulated_latency(&self) -> Duration;
    fn win_probability(&self) -> f64;
    fn sample_postcode(&self) -> &str;
    fn notification_icon(&self) -> Option<&str>;
    fn notification_badge(&self) -> Option<&str>;
    fn force_notifications(&self) -> bool;
}
