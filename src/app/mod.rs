pub mod badge;
pub mod checker;
pub mod settings;

use crate::adapters::http::HttpResultSource;
use crate::adapters::notify::TerminalNotifier;
use crate::adapters::source::SimulatedSource;
use crate::adapters::storage::JsonFileStore;
use crate::core::context::PostcodeContext;
use crate::core::fetcher::ResultFetcher;
use crate::core::notifications::NotificationGateway;
use crate::core::persistence::Persistence;
use crate::domain::model::PostalCode;
use crate::domain::ports::{
    ConfigProvider, KeyValueStore, NotificationPlatform, ResultSource, SourceKind,
};
use crate::utils::error::{Result, WatchError};
use std::sync::Arc;

pub const TITLE: &str = "Postcode Lottery Checker";
pub const TAGLINE: &str = "Check your postcode lottery results and get notifications";

/// Picks the result source named by the configuration.
pub fn build_source<C: ConfigProvider>(config: &C) -> Result<Arc<dyn ResultSource>> {
    match config.source_kind() {
        SourceKind::Simulated => {
            let sample = PostalCode::parse(config.sample_postcode())?;
            Ok(Arc::new(SimulatedSource::new(
                sample,
                config.win_probability(),
                config.simulated_latency(),
            )))
        }
        SourceKind::Http => {
            let endpoint = config.endpoint().ok_or_else(|| WatchError::MissingConfig {
                field: "source.endpoint".to_string(),
            })?;
            Ok(Arc::new(HttpResultSource::new(
                endpoint,
                config.fetch_timeout(),
            )?))
        }
    }
}

/// Composition root: wires store, source and notifier into one context.
pub fn build_context<C: ConfigProvider>(config: &C, assume_yes: bool) -> Result<PostcodeContext> {
    let file_store = JsonFileStore::new(config.store_path());
    tracing::debug!("📁 Using store at {}", file_store.path().display());
    let store: Arc<dyn KeyValueStore> = Arc::new(file_store);
    let persistence = Persistence::new(store);

    let mut notifier = TerminalNotifier::new(persistence.clone()).assume_yes(assume_yes);
    if config.force_notifications() {
        notifier = notifier.force_supported(true);
    }
    let platform: Arc<dyn NotificationPlatform> = Arc::new(notifier);

    let gateway = NotificationGateway::new(platform).with_artwork(
        config.notification_icon().map(str::to_string),
        config.notification_badge().map(str::to_string),
    );
    let fetcher = ResultFetcher::new(build_source(config)?, persistence.clone());

    Ok(PostcodeContext::new(persistence, fetcher, gateway))
}

pub fn render_header() -> String {
    format!("{}\n{}\n", TITLE, TAGLINE)
}

/// Header, checker form, settings panel and footer in one screen.
pub fn render_screen(ctx: &PostcodeContext) -> String {
    let checker = checker::CheckerForm::new(ctx);
    let panel = settings::SettingsPanel::new(ctx);
    format!(
        "{}\n{}\n{}\n{}\n",
        render_header(),
        checker.render(ctx),
        panel.render(ctx),
        badge::render_badge()
    )
}
