use crate::core::context::Shared;
use crate::domain::model::{PostalCode, ResultRecord};
use crate::utils::error::WatchError;
use crate::utils::logger::report_error;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No timer.
    Idle,
    /// Timer armed, waiting for the next tick.
    Scheduled,
    /// A check cycle is running.
    Checking,
}

/// Outcome of one pass over the subscribed postcodes.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub checked: Vec<ResultRecord>,
    pub failed: Vec<(PostalCode, WatchError)>,
    pub wins: Vec<PostalCode>,
    pub skipped: Vec<PostalCode>,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A win transition needs a previous record that had not won.
pub fn is_win_transition(previous: Option<&ResultRecord>, fresh: &ResultRecord) -> bool {
    matches!(previous, Some(previous) if !previous.won) && fresh.won
}

/// Keeps the in-flight counter right even when the task is aborted mid-cycle.
struct CheckingGuard<'a>(&'a Shared);

impl<'a> CheckingGuard<'a> {
    fn enter(shared: &'a Shared) -> Self {
        shared.cycles_in_flight.fetch_add(1, Ordering::SeqCst);
        Self(shared)
    }
}

impl Drop for CheckingGuard<'_> {
    fn drop(&mut self) {
        self.0.cycles_in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 逐一檢查訂閱的郵遞區號；單一失敗不會中斷整個循環
pub(crate) async fn run_check_cycle(shared: &Shared) -> CycleReport {
    let _serial = shared.cycle_lock.lock().await;
    let _checking = CheckingGuard::enter(shared);

    let codes = shared.current_subscriptions().to_vec();
    tracing::info!("🔍 Checking subscribed postcodes: {:?}", codes);

    let mut report = CycleReport::default();
    for code in codes {
        // 循環途中被取消訂閱的就跳過
        if !shared.current_subscriptions().contains(&code) {
            tracing::debug!("Skipping {} (unsubscribed mid-cycle)", code);
            report.skipped.push(code);
            continue;
        }

        let previous = shared.fetcher.cached(&code);
        match shared.fetcher.fetch(&code).await {
            Ok(fresh) => {
                if is_win_transition(previous.as_ref(), &fresh) {
                    tracing::info!("🎉 {} has won", code);
                    shared.notifier.notify_win(&code);
                    report.wins.push(code.clone());
                }
                shared.refresh_displayed(&fresh);
                report.checked.push(fresh);
            }
            Err(e) => {
                report_error(&format!("Error checking subscribed postcode {}", code), &e);
                report.failed.push((code, e));
            }
        }
    }

    tracing::info!(
        "✅ Check cycle finished: {} checked, {} failed, {} wins",
        report.checked.len(),
        report.failed.len(),
        report.wins.len()
    );
    report
}

struct PollTimer {
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollTimer {
    fn spawn(shared: Arc<Shared>, interval: Duration, check_now: bool) -> Self {
        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(tick_loop(shared, interval, check_now, cancelled));
        Self {
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    /// Stops ticking once any in-flight cycle finishes. The handle is kept
    /// by the poller so `stop` can still tear the task down.
    fn retire(mut self) -> Option<JoinHandle<()>> {
        self.cancel.take();
        self.task.take()
    }

    /// Stops immediately and waits until the task is gone.
    async fn cancel(mut self) {
        self.cancel.take();
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn tick_loop(
    shared: Arc<Shared>,
    interval: Duration,
    check_now: bool,
    mut cancelled: oneshot::Receiver<()>,
) {
    let first_tick = if check_now {
        Instant::now()
    } else {
        Instant::now() + interval
    };
    let mut ticker = tokio::time::interval_at(first_tick, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut cancelled => break,
            _ = ticker.tick() => {
                run_check_cycle(&shared).await;
            }
        }
    }
    tracing::debug!("Poll timer stopped");
}

/// Owns the recurring timer. `start` and `stop` are the only ways the timer
/// comes into or goes out of existence; `reschedule` swaps its interval.
pub struct Poller {
    shared: Arc<Shared>,
    timer: Mutex<Option<PollTimer>>,
    /// 改頻率後退役、可能還在跑最後一輪的舊計時器
    retired: Mutex<Vec<JoinHandle<()>>>,
}

impl Poller {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            timer: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        }
    }

    fn timer(&self) -> MutexGuard<'_, Option<PollTimer>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn retired(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.retired.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Arms the timer and runs one check right away. No-op when already armed.
    pub fn start(&self, interval: Duration) -> bool {
        let mut timer = self.timer();
        if timer.is_some() {
            return false;
        }
        tracing::info!("⏱️ Polling every {:?}", interval);
        *timer = Some(PollTimer::spawn(self.shared.clone(), interval, true));
        true
    }

    /// Tears the timer down, retired ones included. No callback fires after
    /// this returns.
    pub async fn stop(&self) {
        let timer = self.timer().take();
        let retired = std::mem::take(&mut *self.retired());

        if let Some(timer) = timer {
            tracing::info!("⏹️ Polling stopped");
            timer.cancel().await;
        }
        for task in retired {
            task.abort();
            let _ = task.await;
        }
    }

    /// New interval for an armed timer. A cycle already running is left to finish.
    pub fn reschedule(&self, interval: Duration) -> bool {
        let mut timer = self.timer();
        let Some(old) = timer.take() else {
            return false;
        };
        if let Some(task) = old.retire() {
            let mut retired = self.retired();
            retired.retain(|task| !task.is_finished());
            retired.push(task);
        }
        tracing::info!("⏱️ Polling interval changed to {:?}", interval);
        *timer = Some(PollTimer::spawn(self.shared.clone(), interval, false));
        true
    }

    pub fn state(&self) -> PollerState {
        if self.shared.cycles_in_flight.load(Ordering::SeqCst) > 0 {
            PollerState::Checking
        } else if self.timer().is_some() {
            PollerState::Scheduled
        } else {
            PollerState::Idle
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        for task in self.retired().drain(..) {
            task.abort();
        }
    }
}
