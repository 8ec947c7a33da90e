use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Invalid postcode: {message}")]
    Validation { message: String },

    #[error("Failed to fetch results for {postcode}: {reason}")]
    FetchFailed { postcode: String, reason: String },

    #[error("Persistence failed for key '{key}': {reason}")]
    PersistenceFailed { key: String, reason: String },

    #[error("Notifications are not supported on this platform")]
    NotificationUnavailable,

    #[error("Notification permission was denied")]
    NotificationDenied,

    #[error("Notification error: {message}")]
    NotificationFailed { message: String },

    #[error("Invalid configuration value for '{field}': {value} ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfig { field: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Network,
    Storage,
    Notification,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl WatchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn fetch_failed(postcode: impl Into<String>, reason: impl ToString) -> Self {
        Self::FetchFailed {
            postcode: postcode.into(),
            reason: reason.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Input,
            Self::FetchFailed { .. } | Self::Http(_) => ErrorCategory::Network,
            Self::PersistenceFailed { .. } | Self::Io(_) | Self::Serialization(_) => {
                ErrorCategory::Storage
            }
            Self::NotificationUnavailable
            | Self::NotificationDenied
            | Self::NotificationFailed { .. } => ErrorCategory::Notification,
            Self::InvalidConfigValue { .. } | Self::MissingConfig { .. } => {
                ErrorCategory::Configuration
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Notification => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// 給終端使用者看的訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::Validation { .. } => "Please enter a valid UK postcode".to_string(),
            Self::FetchFailed { .. } | Self::Http(_) => {
                "There was an error checking your postcode. Please try again.".to_string()
            }
            Self::NotificationUnavailable => {
                "Your terminal does not support notifications.".to_string()
            }
            Self::NotificationDenied => {
                "Notification permissions are blocked. Run `postcode-watch permission --request` to allow them.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Input => "Use a UK postcode such as M33 5QU or SW1A 1AA",
            ErrorCategory::Network => "Check the result source endpoint and try again later",
            ErrorCategory::Storage => "Check that the store file is writable and not corrupted",
            ErrorCategory::Notification => "Grant notification permission and retry",
            ErrorCategory::Configuration => "Fix the configuration file or command-line flags",
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
