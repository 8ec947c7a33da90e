pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use config::Settings;
pub use core::{context::PostcodeContext, poller::PollerState};
pub use domain::model::{PollingConfig, PostalCode, ResultRecord, SubscriptionSet};
pub use utils::error::{Result, WatchError};
