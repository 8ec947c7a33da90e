use crate::domain::model::{Notification, NotificationOptions, Permission, PostalCode};
use crate::domain::ports::NotificationPlatform;
use crate::utils::logger::report_error;
use serde_json::json;
use std::sync::Arc;

pub const WINNER_TITLE: &str = "Postcode Lottery Winner!";

/// Permission checks and notification dispatch. Never returns an error to
/// the caller; platform failures are logged and reported.
#[derive(Clone)]
pub struct NotificationGateway {
    platform: Arc<dyn NotificationPlatform>,
    icon: Option<String>,
    badge: Option<String>,
}

impl NotificationGateway {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        Self {
            platform,
            icon: None,
            badge: None,
        }
    }

    pub fn with_artwork(mut self, icon: Option<String>, badge: Option<String>) -> Self {
        self.icon = icon;
        self.badge = badge;
        self
    }

    pub fn is_supported(&self) -> bool {
        self.platform.is_supported()
    }

    pub fn check_permission(&self) -> Permission {
        if !self.platform.is_supported() {
            return Permission::Denied;
        }
        self.platform.permission()
    }

    /// Asks the platform once. Fails closed: any error becomes `Denied`.
    pub async fn request_permission(&self) -> Permission {
        if !self.platform.is_supported() {
            return Permission::Denied;
        }

        match self.platform.request_permission().await {
            Ok(permission) => {
                tracing::info!("Notification permission: {}", permission);
                permission
            }
            Err(e) => {
                report_error("Error requesting notification permission", &e);
                Permission::Denied
            }
        }
    }

    /// Shows a notification if permission is granted. `None` means nothing
    /// was displayed.
    pub fn notify(&self, title: &str, body: &str, data: serde_json::Value) -> Option<Notification> {
        if self.check_permission() != Permission::Granted {
            tracing::info!("Cannot send notification: permission not granted");
            return None;
        }

        let options = NotificationOptions {
            body: body.to_string(),
            icon: self.icon.clone(),
            badge: self.badge.clone(),
            data,
            require_interaction: true,
        };

        match self.platform.show(title, &options) {
            Ok(id) => Some(Notification {
                id,
                title: title.to_string(),
                options,
            }),
            Err(e) => {
                report_error("Error sending notification", &e);
                None
            }
        }
    }

    pub fn notify_win(&self, postcode: &PostalCode) -> Option<Notification> {
        self.notify(
            WINNER_TITLE,
            &format!("Great news! {} has won!", postcode),
            json!({ "postcode": postcode }),
        )
    }

    /// 點擊通知：把應用程式帶到前景並關閉通知
    pub fn handle_click(&self, notification: &Notification) {
        self.platform.focus_app();
        self.platform.close(notification.id);
    }
}
