use crate::utils::error::{Result, WatchError};
use crate::utils::validation::{canonicalize_postcode, validate_postcode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_POSTCODE: &str = "M33 5QU";
pub const DEFAULT_CHECK_FREQUENCY_MS: u64 = 30 * 60 * 1000;

/// A validated, canonical (trimmed, upper-cased) UK postcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostalCode(String);

impl PostalCode {
    pub fn parse(raw: &str) -> Result<Self> {
        validate_postcode(raw).map(Self)
    }

    /// 預設示範用的郵遞區號
    pub fn sample() -> Self {
        Self(DEFAULT_POSTCODE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against an arbitrary user string after canonicalizing it.
    pub fn matches(&self, raw: &str) -> bool {
        self.0 == canonicalize_postcode(raw)
    }
}

impl TryFrom<String> for PostalCode {
    type Error = WatchError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PostalCode> for String {
    fn from(value: PostalCode) -> Self {
        value.0
    }
}

impl AsRef<str> for PostalCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub postcode: PostalCode,
    pub won: bool,
    pub last_checked: DateTime<Utc>,
    pub message: String,
}

/// 以郵遞區號為鍵的最新結果
pub type ResultMap = HashMap<PostalCode, ResultRecord>;

/// What a result source reports before the fetcher stamps and persists it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LotteryOutcome {
    pub won: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl LotteryOutcome {
    pub fn message_or_default(&self) -> String {
        match &self.message {
            Some(message) if !message.trim().is_empty() => message.clone(),
            _ if self.won => "Congratulations, you're a winner!".to_string(),
            _ => "No win this time, but keep checking!".to_string(),
        }
    }
}

/// Insertion-ordered set of subscribed postcodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionSet(Vec<PostalCode>);

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `code` unless already present. Returns whether the set changed.
    pub fn insert(&mut self, code: PostalCode) -> bool {
        if self.contains(&code) {
            return false;
        }
        self.0.push(code);
        true
    }

    /// Removes the entry matching `raw` after canonicalization.
    pub fn remove(&mut self, raw: &str) -> bool {
        let canonical = canonicalize_postcode(raw);
        let before = self.0.len();
        self.0.retain(|code| code.as_str() != canonical);
        self.0.len() != before
    }

    pub fn contains(&self, code: &PostalCode) -> bool {
        self.0.iter().any(|c| c == code)
    }

    pub fn contains_str(&self, raw: &str) -> bool {
        self.0.iter().any(|c| c.matches(raw))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostalCode> {
        self.0.iter()
    }

    pub fn to_vec(&self) -> Vec<PostalCode> {
        self.0.clone()
    }
}

impl From<Vec<PostalCode>> for SubscriptionSet {
    fn from(codes: Vec<PostalCode>) -> Self {
        let mut set = Self::new();
        for code in codes {
            set.insert(code);
        }
        set
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PollingConfig {
    interval_ms: u64,
}

impl PollingConfig {
    pub fn from_millis(interval_ms: u64) -> Result<Self> {
        if interval_ms == 0 {
            return Err(WatchError::validation("check frequency must be positive"));
        }
        Ok(Self { interval_ms })
    }

    pub fn from_minutes(minutes: u64) -> Result<Self> {
        let interval_ms = minutes
            .checked_mul(60 * 1000)
            .ok_or_else(|| WatchError::validation("check frequency is too large"))?;
        Self::from_millis(interval_ms)
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl TryFrom<u64> for PollingConfig {
    type Error = WatchError;

    fn try_from(value: u64) -> Result<Self> {
        Self::from_millis(value)
    }
}

impl From<PollingConfig> for u64 {
    fn from(value: PollingConfig) -> Self {
        value.interval_ms
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_CHECK_FREQUENCY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Granted,
    Denied,
    Default,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Permission::Granted => "granted",
            Permission::Denied => "denied",
            Permission::Default => "default",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub data: serde_json::Value,
    pub require_interaction: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

/// A notification that has been handed to the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub options: NotificationOptions,
}
