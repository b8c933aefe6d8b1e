//! Market stream transport
//!
//! Opens the server-sent event stream at `/markets/stream` and yields decoded
//! frames. Reconnection is not handled here: a closed stream is reported to
//! the owner, which decides whether to reopen or fall back to snapshots.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{BackendError, BackendResult};
use crate::sse::{SseDecoder, SseEvent};
use crate::types::StreamRequest;

/// Connect timeout for the stream; the body itself has no total timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the stream endpoint
const STREAM_PATH: &str = "/markets/stream";

/// Decoded frames from an open stream
pub type EventStream = Pin<Box<dyn Stream<Item = BackendResult<SseEvent>> + Send>>;

/// A push connection primitive
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> BackendResult<EventStream>;
}

/// Server-sent events over reqwest
#[derive(Clone)]
pub struct SseTransport {
    client: Client,
    base_url: String,
}

impl SseTransport {
    pub fn new(base_url: impl Into<String>) -> BackendResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Build the stream URL. The token travels as a query parameter because
    /// push endpoints cannot rely on custom headers.
    pub fn stream_url(&self, request: &StreamRequest) -> BackendResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, STREAM_PATH))
            .map_err(|e| BackendError::config(format!("Invalid stream URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("lastHours", &request.last_hours.to_string())
            .append_pair("jwt", &request.token)
            .append_pair("wallet", request.wallet.as_str());

        Ok(url)
    }
}

#[async_trait]
impl PushTransport for SseTransport {
    #[instrument(skip(self, request), fields(wallet = %request.wallet))]
    async fn open(&self, request: &StreamRequest) -> BackendResult<EventStream> {
        let url = self.stream_url(request)?;
        debug!("Opening market stream at {}{}", self.base_url, STREAM_PATH);

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| BackendError::network(format!("Failed to open market stream: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("text/event-stream"))
            .unwrap_or(false);
        if !is_event_stream {
            return Err(BackendError::unsupported(
                "backend did not answer with text/event-stream",
            ));
        }

        info!("Market stream connected");

        let mut decoder = SseDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder.feed(&bytes).into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(BackendError::network(format!(
                    "Market stream interrupted: {}",
                    e
                )))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(events))
    }
}
