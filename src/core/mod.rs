pub mod context;
pub mod fetcher;
pub mod notifications;
pub mod persistence;
pub mod poller;

pub use crate::domain::model::{PostalCode, ResultRecord, SubscriptionSet};
pub use crate::domain::ports::{ConfigProvider, KeyValueStore, NotificationPlatform, ResultSource};
pub use crate::utils::error::Result;
