use crate::core::context::PostcodeContext;
use crate::domain::model::{Permission, PostalCode};
use crate::utils::logger::report_error;
use std::fmt::Write;

pub const UNSUPPORTED_MESSAGE: &str = "Your terminal does not support notifications.";
pub const BLOCKED_MESSAGE: &str = "Notification permissions are blocked. Run `postcode-watch permission --request` to allow notifications.";

#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    Unsupported,
    /// Permission is not granted and the subscription was left as is.
    PermissionRefused(Permission),
    Subscribed(PostalCode),
    Unsubscribed(PostalCode),
    Failed(String),
}

/// Notification settings: permission flow plus the subscription list.
#[derive(Debug, Clone)]
pub struct SettingsPanel {
    supported: bool,
    permission: Permission,
}

impl SettingsPanel {
    pub fn new(ctx: &PostcodeContext) -> Self {
        let notifier = ctx.notifier();
        Self {
            supported: notifier.is_supported(),
            permission: notifier.check_permission(),
        }
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Subscribes or unsubscribes the current postcode.
    ///
    /// Unsubscribing never needs permission. Subscribing asks for it first
    /// when still undecided and declining aborts; a previously denied
    /// permission is not re-prompted here.
    pub async fn toggle(&mut self, ctx: &PostcodeContext) -> ToggleOutcome {
        if !self.supported {
            return ToggleOutcome::Unsupported;
        }

        let postcode = ctx.postcode();
        if ctx.is_subscribed(postcode.as_str()) {
            ctx.unsubscribe(postcode.as_str()).await;
            return ToggleOutcome::Unsubscribed(postcode);
        }

        match self.permission {
            Permission::Granted => {}
            Permission::Denied => return ToggleOutcome::PermissionRefused(Permission::Denied),
            Permission::Default => {
                self.permission = ctx.notifier().request_permission().await;
                if self.permission != Permission::Granted {
                    return ToggleOutcome::PermissionRefused(self.permission);
                }
            }
        }

        match ctx.subscribe(postcode.as_str()).await {
            Ok(_) => ToggleOutcome::Subscribed(postcode),
            Err(e) => {
                report_error("Error toggling notification subscription", &e);
                ToggleOutcome::Failed(e.user_friendly_message())
            }
        }
    }

    /// Asks for permission without touching subscriptions.
    pub async fn request_permission(&mut self, ctx: &PostcodeContext) -> Permission {
        if self.supported {
            self.permission = ctx.notifier().request_permission().await;
        }
        self.permission
    }

    /// Per-entry removal from the subscription list.
    pub async fn remove(&self, ctx: &PostcodeContext, raw: &str) -> bool {
        ctx.unsubscribe(raw).await
    }

    pub fn render(&self, ctx: &PostcodeContext) -> String {
        let mut out = String::from("Notifications\n");
        if !self.supported {
            let _ = writeln!(out, "{}", UNSUPPORTED_MESSAGE);
            return out;
        }

        let postcode = ctx.postcode();
        let _ = writeln!(
            out,
            "Want to be notified when there are updates for {}?",
            postcode
        );

        if ctx.is_subscribed(postcode.as_str()) {
            out.push_str("[ Unsubscribe from Updates ]\n");
        } else if self.permission == Permission::Denied {
            let _ = writeln!(out, "  ! {}", BLOCKED_MESSAGE);
        } else {
            out.push_str("[ Subscribe to Updates ]\n");
        }

        let subscriptions = ctx.subscriptions();
        if !subscriptions.is_empty() {
            out.push_str("\nYour Subscriptions\n");
            for code in subscriptions.iter() {
                let _ = writeln!(
                    out,
                    "  {:<10} remove: postcode-watch unsubscribe \"{}\"",
                    code.as_str(),
                    code
                );
            }
        }
        out
    }
}
