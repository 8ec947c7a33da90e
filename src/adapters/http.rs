use crate::domain::model::{LotteryOutcome, PostalCode};
use crate::domain::ports::ResultSource;
use crate::utils::error::{Result, WatchError};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Looks results up at `GET {endpoint}/{postcode}`.
///
/// Every failure mode (transport, timeout, non-2xx, bad body) comes back as
/// [`WatchError::FetchFailed`] so callers only deal with one kind.
pub struct HttpResultSource {
    endpoint: Url,
    client: Client,
}

impl HttpResultSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| WatchError::InvalidConfigValue {
            field: "source.endpoint".to_string(),
            value: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, client })
    }

    fn url_for(&self, postcode: &PostalCode) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| WatchError::InvalidConfigValue {
                field: "source.endpoint".to_string(),
                value: self.endpoint.to_string(),
                reason: "endpoint cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .push(postcode.as_str());
        Ok(url)
    }
}

#[async_trait]
impl ResultSource for HttpResultSource {
    async fn lookup(&self, postcode: &PostalCode) -> Result<LotteryOutcome> {
        let url = self.url_for(postcode)?;
        tracing::debug!("Making API request to: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WatchError::fetch_failed(postcode.as_str(), e))?;

        tracing::debug!("API response status: {}", response.status());

        if !response.status().is_success() {
            return Err(WatchError::fetch_failed(
                postcode.as_str(),
                format!("unexpected status {}", response.status()),
            ));
        }

        response
            .json::<LotteryOutcome>()
            .await
            .map_err(|e| WatchError::fetch_failed(postcode.as_str(), e))
    }
}
