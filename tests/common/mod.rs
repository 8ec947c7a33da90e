#![allow(dead_code)]

use async_trait::async_trait;
use postcode_watch::adapters::storage::MemoryStore;
use postcode_watch::core::fetcher::ResultFetcher;
use postcode_watch::core::notifications::NotificationGateway;
use postcode_watch::core::persistence::{Persistence, POSTCODE_RESULTS_KEY};
use postcode_watch::domain::model::{
    LotteryOutcome, NotificationId, NotificationOptions, Permission, ResultMap,
};
use postcode_watch::domain::ports::{NotificationPlatform, ResultSource};
use postcode_watch::{PostalCode, PostcodeContext, Result, WatchError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Result source with per-postcode scripted outcomes and a call log.
#[derive(Default)]
pub struct ScriptedSource {
    latency: Duration,
    failing: HashSet<String>,
    scripts: Mutex<HashMap<String, VecDeque<bool>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_for(mut self, postcode: &str) -> Self {
        self.failing.insert(postcode.to_string());
        self
    }

    /// Outcomes returned in order; once exhausted the code loses.
    pub fn script(self, postcode: &str, outcomes: &[bool]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(postcode.to_string(), outcomes.iter().copied().collect());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ResultSource for ScriptedSource {
    async fn lookup(&self, postcode: &PostalCode) -> Result<LotteryOutcome> {
        self.calls.lock().unwrap().push(postcode.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.contains(postcode.as_str()) {
            return Err(WatchError::fetch_failed(postcode.as_str(), "backend down"));
        }

        let won = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(postcode.as_str())
            .and_then(|outcomes| outcomes.pop_front())
            .unwrap_or(false);
        Ok(LotteryOutcome { won, message: None })
    }
}

/// Notification platform that records what it was asked to do.
pub struct RecordingPlatform {
    pub supported: bool,
    permission: Mutex<Permission>,
    answer: Permission,
    prompts: Mutex<usize>,
    shown: Mutex<Vec<(String, NotificationOptions)>>,
}

impl RecordingPlatform {
    pub fn new(permission: Permission) -> Self {
        Self {
            supported: true,
            permission: Mutex::new(permission),
            answer: Permission::Granted,
            prompts: Mutex::new(0),
            shown: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::new(Permission::Granted)
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new(Permission::Default)
        }
    }

    pub fn answering(mut self, answer: Permission) -> Self {
        self.answer = answer;
        self
    }

    pub fn prompts(&self) -> usize {
        *self.prompts.lock().unwrap()
    }

    pub fn shown(&self) -> Vec<(String, NotificationOptions)> {
        self.shown.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationPlatform for RecordingPlatform {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> Permission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> Result<Permission> {
        *self.prompts.lock().unwrap() += 1;
        *self.permission.lock().unwrap() = self.answer;
        Ok(self.answer)
    }

    fn show(&self, title: &str, options: &NotificationOptions) -> Result<NotificationId> {
        let mut shown = self.shown.lock().unwrap();
        shown.push((title.to_string(), options.clone()));
        Ok(NotificationId(shown.len() as u64))
    }

    fn focus_app(&self) {}

    fn close(&self, _id: NotificationId) {}
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub source: Arc<ScriptedSource>,
    pub platform: Arc<RecordingPlatform>,
    pub ctx: PostcodeContext,
}

impl Harness {
    pub fn new(source: ScriptedSource, platform: RecordingPlatform) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), source, platform)
    }

    pub fn with_store(
        store: Arc<MemoryStore>,
        source: ScriptedSource,
        platform: RecordingPlatform,
    ) -> Self {
        let source = Arc::new(source);
        let platform = Arc::new(platform);
        let persistence = Persistence::new(store.clone());
        let fetcher = ResultFetcher::new(source.clone(), persistence.clone());
        let gateway = NotificationGateway::new(platform.clone());
        let ctx = PostcodeContext::new(persistence, fetcher, gateway);
        Self {
            store,
            source,
            platform,
            ctx,
        }
    }

    /// Context that never arms a timer; cycles are driven by hand.
    pub fn without_polling(mut self) -> Self {
        self.ctx = self.ctx.with_polling(false);
        self
    }

    /// Context that re-reads subscriptions from the store each cycle.
    pub fn following_store(mut self) -> Self {
        self.ctx = self.ctx.with_store_sync(true);
        self
    }

    pub fn persistence(&self) -> Persistence {
        Persistence::new(self.store.clone())
    }

    pub fn persisted_results(&self) -> ResultMap {
        self.persistence()
            .load(POSTCODE_RESULTS_KEY)
            .unwrap_or_default()
    }
}

pub fn code(raw: &str) -> PostalCode {
    PostalCode::parse(raw).unwrap()
}
