use crate::config::toml_config::TomlConfig;
use crate::config::Settings;
use crate::domain::ports::SourceKind;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "postcode-watch")]
#[command(about = "Check your postcode lottery results and get notifications")]
pub struct CliConfig {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to the JSON key-value store
    #[arg(long, global = true)]
    pub store: Option<String>,

    /// Where results come from
    #[arg(long, value_enum, global = true)]
    pub source: Option<SourceKind>,

    /// Base URL of the results API (for `--source http`)
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit JSON log lines")]
    pub json_logs: bool,

    /// Answer yes to the notification permission prompt
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    /// Show notifications even when stdout is not a terminal
    #[arg(long, global = true)]
    pub force_notifications: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Check results for a postcode (defaults to the current one)
    Check { postcode: Option<String> },
    /// Subscribe to win notifications for a postcode
    Subscribe { postcode: Option<String> },
    /// Stop notifications for a postcode
    Unsubscribe { postcode: Option<String> },
    /// Toggle the subscription for the current postcode
    Toggle,
    /// List subscriptions
    List,
    /// Set how often subscribed postcodes are checked
    Frequency { minutes: u64 },
    /// Show or request notification permission
    Permission {
        #[arg(long)]
        request: bool,
    },
    /// Show the current postcode, last result and subscriptions
    Status,
    /// Poll subscribed postcodes until interrupted
    Watch,
}

impl CliConfig {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Status)
    }

    /// 合併 TOML 檔與命令列參數
    pub fn settings(&self) -> Result<Settings> {
        let file_config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        let mut settings = Settings::from_toml(file_config);
        if let Some(store) = &self.store {
            settings.store_path = store.clone();
        }
        if let Some(source) = self.source {
            settings.source_kind = source;
        }
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = Some(endpoint.clone());
        }
        if self.force_notifications {
            settings.force_notifications = true;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = CliConfig::parse_from(["postcode-watch", "check", "m33 5qu"]);
        assert_eq!(
            cli.command(),
            Command::Check {
                postcode: Some("m33 5qu".to_string())
            }
        );

        let cli = CliConfig::parse_from(["postcode-watch"]);
        assert_eq!(cli.command(), Command::Status);

        let cli = CliConfig::parse_from(["postcode-watch", "frequency", "15", "--yes"]);
        assert_eq!(cli.command(), Command::Frequency { minutes: 15 });
        assert!(cli.yes);
    }

    #[test]
    fn test_flags_override_settings() {
        let cli = CliConfig::parse_from([
            "postcode-watch",
            "--store",
            "/tmp/store.json",
            "--source",
            "http",
            "--endpoint",
            "https://lottery.example.com",
            "list",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.store_path, "/tmp/store.json");
        assert_eq!(settings.source_kind, SourceKind::Http);
        assert_eq!(
            settings.endpoint.as_deref(),
            Some("https://lottery.example.com")
        );
    }
}
