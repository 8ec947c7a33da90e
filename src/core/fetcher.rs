use crate::core::persistence::{Persistence, POSTCODE_RESULTS_KEY};
use crate::domain::model::{PostalCode, ResultMap, ResultRecord};
use crate::domain::ports::ResultSource;
use crate::utils::error::Result;
use chrono::{TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Fetches a fresh [`ResultRecord`] and stores it as the latest for its code.
#[derive(Clone)]
pub struct ResultFetcher {
    source: Arc<dyn ResultSource>,
    persistence: Persistence,
}

impl ResultFetcher {
    pub fn new(source: Arc<dyn ResultSource>, persistence: Persistence) -> Self {
        Self {
            source,
            persistence,
        }
    }

    pub async fn fetch(&self, postcode: &PostalCode) -> Result<ResultRecord> {
        tracing::info!("Fetching results for postcode: {}", postcode);
        let outcome = self.source.lookup(postcode).await?;

        let mut all_results = self.all_results();
        let mut last_checked = Utc::now();
        // lastChecked 必須嚴格遞增
        if let Some(previous) = all_results.get(postcode) {
            if last_checked <= previous.last_checked {
                last_checked = previous.last_checked + TimeDelta::milliseconds(1);
            }
        }

        let record = ResultRecord {
            postcode: postcode.clone(),
            won: outcome.won,
            last_checked,
            message: outcome.message_or_default(),
        };

        all_results.insert(postcode.clone(), record.clone());
        // 寫入失敗已在 Persistence 內記錄，結果仍回傳給呼叫端
        let _ = self.persistence.save(POSTCODE_RESULTS_KEY, &all_results);

        Ok(record)
    }

    /// Every readable record. Entries that no longer decode are dropped one
    /// by one so the rest of the history survives the next save.
    pub fn all_results(&self) -> ResultMap {
        let raw: HashMap<String, serde_json::Value> = self
            .persistence
            .load(POSTCODE_RESULTS_KEY)
            .unwrap_or_default();

        raw.into_iter()
            .filter_map(|(key, value)| match serde_json::from_value::<ResultRecord>(value) {
                Ok(record) => Some((record.postcode.clone(), record)),
                Err(e) => {
                    tracing::warn!("⚠️ Dropping unreadable result for {}: {}", key, e);
                    None
                }
            })
            .collect()
    }

    /// Last persisted record for `postcode`, if any.
    pub fn cached(&self, postcode: &PostalCode) -> Option<ResultRecord> {
        self.all_results().remove(postcode)
    }
}
