//! Snapshot Fetcher
//!
//! One-shot segmented REST fetches used whenever the stream is not running.
//! Segments are committed as they arrive so consumers see active markets
//! before the slower resolved backlog lands.

use std::sync::Arc;

use market_backend::{AuthProvider, MarketsApi, Segment, Session};
use market_core::MarketPatch;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::sink::MarketSink;

/// Outcome of one progressive fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Segments that returned data (possibly empty)
    pub segments_loaded: usize,
    /// Segments that failed and were skipped
    pub segments_failed: usize,
    /// Records changed in the store
    pub changed: usize,
    /// Stopped early because the owner cancelled
    pub cancelled: bool,
}

pub struct SnapshotFetcher {
    api: Arc<dyn MarketsApi>,
    auth: Arc<dyn AuthProvider>,
    last_hours: u32,
}

impl SnapshotFetcher {
    pub fn new(api: Arc<dyn MarketsApi>, auth: Arc<dyn AuthProvider>, last_hours: u32) -> Self {
        Self {
            api,
            auth,
            last_hours,
        }
    }

    pub fn last_hours(&self) -> u32 {
        self.last_hours
    }

    /// Fetch active, observing and resolved markets in sequence, committing
    /// each segment to `sink` as soon as it arrives.
    ///
    /// Segment failures are logged and skipped; nothing is returned as an
    /// error.
    #[instrument(skip_all, fields(wallet = %session.wallet))]
    pub async fn fetch_progressive_fallback(
        &self,
        session: &Session,
        sink: &dyn MarketSink,
        cancel: &CancelFlag,
    ) -> FetchReport {
        let mut report = FetchReport::default();

        for segment in Segment::ALL {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some(records) = self.fetch_segment(segment, session).await else {
                report.segments_failed += 1;
                continue;
            };
            report.segments_loaded += 1;

            if cancel.is_cancelled() {
                debug!("Discarding {} segment, fetch was cancelled", segment);
                report.cancelled = true;
                break;
            }

            let count = records.len();
            let changed = sink.emit(records);
            report.changed += changed;
            debug!("{} segment: {} markets, {} changed", segment, count, changed);
        }

        info!(
            "Snapshot fetch done: {} segments loaded, {} failed, {} markets changed",
            report.segments_loaded, report.segments_failed, report.changed
        );
        report
    }

    /// Fetch one segment with a fresh token. Any failure means "no data".
    async fn fetch_segment(&self, segment: Segment, session: &Session) -> Option<Vec<MarketPatch>> {
        let token = match self.auth.token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("No token for {} segment: {}", segment, e);
                return None;
            }
        };

        match self
            .api
            .fetch_segment(segment, self.last_hours, &token, &session.wallet)
            .await
        {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("Failed to fetch {} markets: {}", segment, e);
                None
            }
        }
    }
}
