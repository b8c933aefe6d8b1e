//! Markets REST client
//!
//! Fetches the segmented market snapshots used when the stream is not
//! running.

use async_trait::async_trait;
use market_core::{parse_market_list, MarketPatch};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::auth::WalletAddress;
use crate::error::{BackendError, BackendResult};
use crate::types::{Segment, WALLET_HEADER};

/// Default per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Source of segmented market snapshots
#[async_trait]
pub trait MarketsApi: Send + Sync {
    /// Fetch one segment. `last_hours` only applies to [`Segment::Resolved`].
    async fn fetch_segment(
        &self,
        segment: Segment,
        last_hours: u32,
        token: &str,
        wallet: &WalletAddress,
    ) -> BackendResult<Vec<MarketPatch>>;
}

/// reqwest-backed markets client
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a client for `base_url` with the default request timeout
    pub fn new(base_url: impl Into<String>) -> BackendResult<Self> {
        Self::with_timeout(base_url, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn segment_url(&self, segment: Segment) -> String {
        format!("{}{}", self.base_url, segment.path())
    }
}

#[async_trait]
impl MarketsApi for BackendClient {
    #[instrument(skip(self, token, wallet))]
    async fn fetch_segment(
        &self,
        segment: Segment,
        last_hours: u32,
        token: &str,
        wallet: &WalletAddress,
    ) -> BackendResult<Vec<MarketPatch>> {
        let url = self.segment_url(segment);
        debug!("Fetching {} markets from: {}", segment, url);

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header(WALLET_HEADER, wallet.as_str());

        if segment == Segment::Resolved {
            request = request.query(&[("lastHours", last_hours)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::network(format!("Failed to fetch {} markets: {}", segment, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::network(format!("Failed to read {} markets: {}", segment, e)))?;

        let batch = parse_market_list(&body)?;
        if batch.skipped > 0 {
            warn!(
                "Skipped {} malformed entries in {} segment",
                batch.skipped, segment
            );
        }

        debug!("Got {} {} markets", batch.patches.len(), segment);
        Ok(batch.patches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_urls() {
        let client = BackendClient::new("https://api.example.com/").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(
            client.segment_url(Segment::Observing),
            "https://api.example.com/markets/observing"
        );
        assert_eq!(
            client.segment_url(Segment::Resolved),
            "https://api.example.com/markets/resolved"
        );
    }
}
