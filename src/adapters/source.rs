use crate::domain::model::{LotteryOutcome, PostalCode};
use crate::domain::ports::ResultSource;
use crate::utils::error::{Result, WatchError};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_LATENCY: Duration = Duration::from_millis(1500);
pub const DEFAULT_WIN_PROBABILITY: f64 = 0.3;

/// Stand-in for a real lottery backend.
///
/// Only the sample postcode can win, with `win_probability`; everything else
/// always loses. Each lookup sleeps for `latency` to mimic a network call.
pub struct SimulatedSource {
    sample: PostalCode,
    win_probability: f64,
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    pub fn new(sample: PostalCode, win_probability: f64, latency: Duration) -> Self {
        Self {
            sample,
            win_probability,
            latency,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// 固定種子，測試用
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    fn roll(&self) -> Result<bool> {
        let mut rng = self.rng.lock().map_err(|_| WatchError::FetchFailed {
            postcode: self.sample.to_string(),
            reason: "random source poisoned".to_string(),
        })?;
        Ok(rng.random::<f64>() < self.win_probability)
    }
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(PostalCode::sample(), DEFAULT_WIN_PROBABILITY, DEFAULT_LATENCY)
    }
}

#[async_trait]
impl ResultSource for SimulatedSource {
    async fn lookup(&self, postcode: &PostalCode) -> Result<LotteryOutcome> {
        tracing::debug!("Fetching results for postcode: {}", postcode);
        tokio::time::sleep(self.latency).await;

        let won = *postcode == self.sample && self.roll()?;
        Ok(LotteryOutcome { won, message: None })
    }
}
