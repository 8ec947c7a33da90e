use clap::Parser;
use postcode_watch::app::checker::{CheckerForm, SubmitOutcome};
use postcode_watch::app::settings::{SettingsPanel, ToggleOutcome, BLOCKED_MESSAGE};
use postcode_watch::app::{build_context, render_screen};
use postcode_watch::domain::model::Permission;
use postcode_watch::utils::error::ErrorSeverity;
use postcode_watch::core::context::STORE_SYNC_INTERVAL;
use postcode_watch::utils::logger::report_error;
use postcode_watch::utils::{logger, validation::Validate};
use postcode_watch::{CliConfig, Command, PostcodeContext, WatchError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::debug!("CLI config: {:?}", cli);

    let settings = match cli.settings().and_then(|settings| {
        settings.validate()?;
        Ok(settings)
    }) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let command = cli.command();
    let watching = command == Command::Watch;
    let ctx = build_context(&settings, cli.yes)?
        .with_polling(watching)
        .with_store_sync(watching);

    let outcome = run(&ctx, command).await;
    // 結束前先拆掉計時器
    ctx.shutdown().await;

    if let Err(e) = outcome {
        tracing::debug!(
            "Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 3,
            ErrorSeverity::Critical => 4,
        };
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run(ctx: &PostcodeContext, command: Command) -> Result<(), WatchError> {
    match command {
        Command::Check { postcode } => {
            let mut form = CheckerForm::new(ctx);
            if let Some(postcode) = postcode {
                form.set_input(postcode);
            }
            let outcome = form.submit(ctx).await;
            println!("{}", form.render(ctx));
            match outcome {
                SubmitOutcome::Checked(_) | SubmitOutcome::Busy => Ok(()),
                SubmitOutcome::Rejected => Err(WatchError::validation(form.input())),
                SubmitOutcome::Failed => Err(WatchError::fetch_failed(
                    form.input(),
                    "result source unavailable",
                )),
            }
        }
        Command::Subscribe { postcode } => {
            let mut panel = SettingsPanel::new(ctx);
            if !panel.is_supported() {
                return Err(WatchError::NotificationUnavailable);
            }
            if panel.permission() == Permission::Default {
                panel.request_permission(ctx).await;
            }
            if panel.permission() != Permission::Granted {
                return Err(WatchError::NotificationDenied);
            }

            let postcode = postcode.unwrap_or_else(|| ctx.postcode().to_string());
            if ctx.subscribe(&postcode).await? {
                println!("✅ Subscribed to {}", postcode.trim().to_uppercase());
            } else {
                println!("Already subscribed to {}", postcode.trim().to_uppercase());
            }
            Ok(())
        }
        Command::Unsubscribe { postcode } => {
            let panel = SettingsPanel::new(ctx);
            let postcode = postcode.unwrap_or_else(|| ctx.postcode().to_string());
            if panel.remove(ctx, &postcode).await {
                println!("Unsubscribed from {}", postcode.trim().to_uppercase());
            } else {
                println!("Not subscribed to {}", postcode.trim().to_uppercase());
            }
            Ok(())
        }
        Command::Toggle => {
            let mut panel = SettingsPanel::new(ctx);
            let outcome = panel.toggle(ctx).await;
            println!("{}", panel.render(ctx));
            match outcome {
                ToggleOutcome::Subscribed(_) | ToggleOutcome::Unsubscribed(_) => Ok(()),
                ToggleOutcome::Unsupported => Err(WatchError::NotificationUnavailable),
                ToggleOutcome::PermissionRefused(_) => Err(WatchError::NotificationDenied),
                ToggleOutcome::Failed(message) => Err(WatchError::validation(message)),
            }
        }
        Command::List => {
            println!("{}", SettingsPanel::new(ctx).render(ctx));
            Ok(())
        }
        Command::Frequency { minutes } => {
            let frequency = ctx.update_check_frequency(minutes)?;
            println!(
                "⏱️ Subscribed postcodes will be checked every {} minute(s) ({} ms)",
                minutes,
                frequency.interval_ms()
            );
            Ok(())
        }
        Command::Permission { request } => {
            let mut panel = SettingsPanel::new(ctx);
            if !panel.is_supported() {
                return Err(WatchError::NotificationUnavailable);
            }
            let permission = if request {
                panel.request_permission(ctx).await
            } else {
                panel.permission()
            };
            println!("Notification permission: {}", permission);
            if permission == Permission::Denied {
                println!("{}", BLOCKED_MESSAGE);
            }
            Ok(())
        }
        Command::Status => {
            println!("{}", render_screen(ctx));
            Ok(())
        }
        Command::Watch => {
            if !ctx.resume() {
                println!("No subscribed postcodes. Use `postcode-watch subscribe <POSTCODE>` first.");
                return Ok(());
            }
            tracing::info!(
                "👀 Watching {} postcode(s) every {} ms; press Ctrl-C to stop",
                ctx.subscriptions().len(),
                ctx.check_frequency().interval_ms()
            );
            // 其他指令 (subscribe / unsubscribe / frequency) 寫入的變更會在這裡同步
            ctx.follow_store(STORE_SYNC_INTERVAL, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    report_error("Error waiting for Ctrl-C", &e);
                }
            })
            .await;
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
