use crate::core::persistence::{Persistence, NOTIFICATION_PERMISSION_KEY};
use crate::domain::model::{NotificationId, NotificationOptions, Permission};
use crate::domain::ports::NotificationPlatform;
use crate::utils::error::{Result, WatchError};
use async_trait::async_trait;
use std::io::{BufRead, IsTerminal, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Notifications rendered as a banner on stdout.
///
/// The terminal has no permission model of its own, so the user's answer to
/// the prompt is remembered in the store under `notificationPermission`.
pub struct TerminalNotifier {
    persistence: Persistence,
    supported: bool,
    assume_yes: bool,
    next_id: AtomicU64,
}

impl TerminalNotifier {
    pub fn new(persistence: Persistence) -> Self {
        Self {
            persistence,
            supported: std::io::stdout().is_terminal(),
            assume_yes: false,
            next_id: AtomicU64::new(1),
        }
    }

    /// 非互動環境 (例如 systemd、CI) 也強制啟用
    pub fn force_supported(mut self, supported: bool) -> Self {
        self.supported = supported;
        self
    }

    pub fn assume_yes(mut self, assume_yes: bool) -> Self {
        self.assume_yes = assume_yes;
        self
    }

    fn prompt() -> std::io::Result<Permission> {
        let mut stderr = std::io::stderr();
        write!(stderr, "Allow postcode-watch to show notifications? [y/N] ")?;
        stderr.flush()?;

        let mut answer = String::new();
        std::io::stdin().lock().read_line(&mut answer)?;
        Ok(parse_answer(&answer))
    }
}

fn parse_answer(answer: &str) -> Permission {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Permission::Granted,
        "n" | "no" => Permission::Denied,
        _ => Permission::Default,
    }
}

#[async_trait]
impl NotificationPlatform for TerminalNotifier {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Permission {
        self.persistence
            .load(NOTIFICATION_PERMISSION_KEY)
            .unwrap_or(Permission::Default)
    }

    async fn request_permission(&self) -> Result<Permission> {
        let permission = if self.assume_yes {
            Permission::Granted
        } else {
            tokio::task::spawn_blocking(Self::prompt)
                .await
                .map_err(|e| WatchError::NotificationFailed {
                    message: e.to_string(),
                })??
        };

        if permission != Permission::Default {
            let _ = self.persistence.save(NOTIFICATION_PERMISSION_KEY, &permission);
        }
        Ok(permission)
    }

    fn show(&self, title: &str, options: &NotificationOptions) -> Result<NotificationId> {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "\x07")?;
        writeln!(stdout, "🔔 {}", title)?;
        writeln!(stdout, "   {}", options.body)?;
        stdout.flush()?;
        tracing::debug!(id = id.0, data = %options.data, "Notification shown");
        Ok(id)
    }

    fn focus_app(&self) {
        tracing::debug!("Focus requested for terminal session");
    }

    fn close(&self, id: NotificationId) {
        tracing::debug!(id = id.0, "Notification dismissed");
    }
}
