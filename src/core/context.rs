use crate::core::fetcher::ResultFetcher;
use crate::core::notifications::NotificationGateway;
use crate::core::persistence::{
    Persistence, CHECK_FREQUENCY_KEY, CURRENT_POSTCODE_KEY, SUBSCRIBED_POSTCODES_KEY,
};
use crate::core::poller::{run_check_cycle, CycleReport, Poller, PollerState};
use crate::domain::model::{PollingConfig, PostalCode, ResultRecord, SubscriptionSet};
use crate::utils::error::Result;
use crate::utils::logger::report_error;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// How often `watch` picks up changes made by other commands.
pub const STORE_SYNC_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct ContextState {
    postcode: PostalCode,
    results: Option<ResultRecord>,
    subscriptions: SubscriptionSet,
    frequency: PollingConfig,
}

/// State reachable from both the context and the poll timer task.
pub(crate) struct Shared {
    pub(crate) persistence: Persistence,
    pub(crate) fetcher: ResultFetcher,
    pub(crate) notifier: NotificationGateway,
    pub(crate) cycle_lock: tokio::sync::Mutex<()>,
    pub(crate) cycles_in_flight: AtomicUsize,
    loading: AtomicBool,
    follow_store: AtomicBool,
    state: Mutex<ContextState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, ContextState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn subscriptions(&self) -> SubscriptionSet {
        self.state().subscriptions.clone()
    }

    /// Subscriptions as a check cycle should see them. When following the
    /// store, other processes' writes win over the in-memory copy.
    pub(crate) fn current_subscriptions(&self) -> SubscriptionSet {
        if self.follow_store.load(Ordering::SeqCst) {
            self.reload_subscriptions()
        } else {
            self.subscriptions()
        }
    }

    /// 重新讀取儲存層的訂閱清單；讀取失敗就沿用記憶體中的版本
    fn reload_subscriptions(&self) -> SubscriptionSet {
        match self
            .persistence
            .try_load::<SubscriptionSet>(SUBSCRIBED_POSTCODES_KEY)
        {
            Ok(stored) => {
                let stored = stored.unwrap_or_default();
                self.state().subscriptions = stored.clone();
                stored
            }
            Err(e) => {
                report_error("Error reloading subscriptions", &e);
                self.subscriptions()
            }
        }
    }

    /// Returns the stored frequency and whether it differs from the one in use.
    fn reload_frequency(&self) -> (PollingConfig, bool) {
        let stored = match self
            .persistence
            .try_load::<PollingConfig>(CHECK_FREQUENCY_KEY)
        {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                report_error("Error reloading check frequency", &e);
                return (self.state().frequency, false);
            }
        };

        let mut state = self.state();
        let changed = state.frequency != stored;
        state.frequency = stored;
        (stored, changed)
    }

    /// Keeps the displayed result in sync when a background check touches it.
    pub(crate) fn refresh_displayed(&self, record: &ResultRecord) {
        let mut state = self.state();
        if state.postcode == record.postcode {
            state.results = Some(record.clone());
        }
    }
}

/// Resets the loading flag however the fetch ends.
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The single owner of application state: current postcode, displayed
/// result, subscriptions, check frequency and the poll timer. Views receive a
/// reference to it; nothing else mutates this state.
pub struct PostcodeContext {
    shared: Arc<Shared>,
    poller: Poller,
    polling_enabled: bool,
}

impl PostcodeContext {
    /// 從儲存層還原上次的狀態
    pub fn new(
        persistence: Persistence,
        fetcher: ResultFetcher,
        notifier: NotificationGateway,
    ) -> Self {
        let postcode = persistence
            .load::<PostalCode>(CURRENT_POSTCODE_KEY)
            .unwrap_or_else(PostalCode::sample);
        let results = fetcher.cached(&postcode);
        let subscriptions = persistence
            .load::<SubscriptionSet>(SUBSCRIBED_POSTCODES_KEY)
            .unwrap_or_default();
        let frequency = persistence
            .load::<PollingConfig>(CHECK_FREQUENCY_KEY)
            .unwrap_or_default();

        tracing::debug!(
            "Restored state: postcode={}, subscriptions={}, frequency={}ms",
            postcode,
            subscriptions.len(),
            frequency.interval_ms()
        );

        let shared = Arc::new(Shared {
            persistence,
            fetcher,
            notifier,
            cycle_lock: tokio::sync::Mutex::new(()),
            cycles_in_flight: AtomicUsize::new(0),
            loading: AtomicBool::new(false),
            follow_store: AtomicBool::new(false),
            state: Mutex::new(ContextState {
                postcode,
                results,
                subscriptions,
                frequency,
            }),
        });

        Self {
            poller: Poller::new(shared.clone()),
            shared,
            polling_enabled: true,
        }
    }

    /// One-shot commands turn polling off so no timer is ever armed.
    pub fn with_polling(mut self, enabled: bool) -> Self {
        self.polling_enabled = enabled;
        self
    }

    /// Long-running processes share the store with one-shot commands; with
    /// this on, every check cycle re-reads the subscriptions first.
    pub fn with_store_sync(self, enabled: bool) -> Self {
        self.shared.follow_store.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn postcode(&self) -> PostalCode {
        self.shared.state().postcode.clone()
    }

    pub fn set_postcode(&self, raw: &str) -> Result<PostalCode> {
        let postcode = PostalCode::parse(raw)?;
        let cached = self.shared.fetcher.cached(&postcode);
        {
            let mut state = self.shared.state();
            state.postcode = postcode.clone();
            state.results = cached;
        }
        let _ = self.shared.persistence.save(CURRENT_POSTCODE_KEY, &postcode);
        Ok(postcode)
    }

    pub fn results(&self) -> Option<ResultRecord> {
        self.shared.state().results.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.loading.load(Ordering::SeqCst)
    }

    /// Interactive check; `None` checks the current postcode.
    pub async fn check_results(&self, postcode: Option<&PostalCode>) -> Result<ResultRecord> {
        let postcode = postcode.cloned().unwrap_or_else(|| self.postcode());

        self.shared.loading.store(true, Ordering::SeqCst);
        let _loading = LoadingGuard(&self.shared.loading);

        match self.shared.fetcher.fetch(&postcode).await {
            Ok(record) => {
                self.shared.state().results = Some(record.clone());
                Ok(record)
            }
            Err(e) => {
                report_error("Error fetching postcode results", &e);
                Err(e)
            }
        }
    }

    pub fn subscriptions(&self) -> SubscriptionSet {
        self.shared.subscriptions()
    }

    pub fn is_subscribed(&self, raw: &str) -> bool {
        self.shared.state().subscriptions.contains_str(raw)
    }

    /// Returns `false` when the postcode was already subscribed.
    pub async fn subscribe(&self, raw: &str) -> Result<bool> {
        let postcode = PostalCode::parse(raw)?;
        let (inserted, was_empty, snapshot, frequency) = {
            let mut state = self.shared.state();
            let was_empty = state.subscriptions.is_empty();
            let inserted = state.subscriptions.insert(postcode.clone());
            (
                inserted,
                was_empty,
                state.subscriptions.clone(),
                state.frequency,
            )
        };

        if !inserted {
            return Ok(false);
        }

        let _ = self
            .shared
            .persistence
            .save(SUBSCRIBED_POSTCODES_KEY, &snapshot);
        tracing::info!("Subscribed to postcode: {}", postcode);

        if was_empty {
            self.start(frequency);
        }
        Ok(true)
    }

    /// Unknown or malformed postcodes are a silent no-op.
    pub async fn unsubscribe(&self, raw: &str) -> bool {
        let (removed, snapshot) = {
            let mut state = self.shared.state();
            let removed = state.subscriptions.remove(raw);
            (removed, state.subscriptions.clone())
        };

        if !removed {
            return false;
        }

        let _ = self
            .shared
            .persistence
            .save(SUBSCRIBED_POSTCODES_KEY, &snapshot);
        tracing::info!("Unsubscribed from postcode: {}", raw.trim().to_uppercase());

        if snapshot.is_empty() {
            self.stop().await;
        }
        true
    }

    pub fn check_frequency(&self) -> PollingConfig {
        self.shared.state().frequency
    }

    pub fn update_check_frequency(&self, minutes: u64) -> Result<PollingConfig> {
        let frequency = PollingConfig::from_minutes(minutes)?;
        self.shared.state().frequency = frequency;
        let _ = self.shared.persistence.save(CHECK_FREQUENCY_KEY, &frequency);
        self.poller.reschedule(frequency.interval());
        Ok(frequency)
    }

    /// Runs one check cycle right now, outside the timer.
    pub async fn check_subscribed_now(&self) -> CycleReport {
        run_check_cycle(&self.shared).await
    }

    pub fn notifier(&self) -> &NotificationGateway {
        &self.shared.notifier
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    /// Arms the timer if persisted subscriptions exist.
    pub fn resume(&self) -> bool {
        let (has_subscriptions, frequency) = {
            let state = self.shared.state();
            (!state.subscriptions.is_empty(), state.frequency)
        };
        has_subscriptions && self.start(frequency)
    }

    fn start(&self, frequency: PollingConfig) -> bool {
        if !self.polling_enabled {
            return false;
        }
        self.poller.start(frequency.interval())
    }

    async fn stop(&self) {
        self.poller.stop().await;
    }

    /// Pulls subscriptions and frequency written by other processes and
    /// brings the timer in line: stopped when nothing is subscribed,
    /// rescheduled on a new frequency, started when codes appear.
    pub async fn sync_with_store(&self) -> PollerState {
        let subscriptions = self.shared.reload_subscriptions();
        let (frequency, changed) = self.shared.reload_frequency();

        if subscriptions.is_empty() {
            self.stop().await;
        } else {
            if changed {
                self.poller.reschedule(frequency.interval());
            }
            self.start(frequency);
        }
        self.poller_state()
    }

    /// Runs [`PostcodeContext::sync_with_store`] every `every` until
    /// `shutdown` resolves.
    pub async fn follow_store<F>(&self, every: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let state = self.sync_with_store().await;
                    tracing::debug!("Store sync done, poller {:?}", state);
                }
            }
        }
    }

    /// Tears the timer down before the context goes away.
    pub async fn shutdown(&self) {
        self.stop().await;
    }
}
