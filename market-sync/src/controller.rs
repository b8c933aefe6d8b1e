//! Markets Controller
//!
//! Owns the store and its producers for one wallet session and exposes the
//! read surface consumers bind to.
//!
//! Activation tries the stream first. While it runs, REST fetches are not
//! needed; when it cannot start or later closes, the controller fetches
//! snapshots and, if a poll interval is configured, keeps polling until the
//! stream comes back.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use market_backend::{
    AuthProvider, BackendClient, MarketsApi, PushTransport, Session, SseTransport, StaticToken,
};
use market_core::{ChainEvent, MarketKey, MarketRecord, MarketState, PositionRecord};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::cancel::CancelFlag;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::fetcher::{FetchReport, SnapshotFetcher};
use crate::reconciler::EventReconciler;
use crate::sink::MarketSink;
use crate::store::{MarketSnapshot, MarketStore};
use crate::stream_client::{CloseReason, StreamClient};

/// What consumers render
#[derive(Debug, Clone)]
pub struct MarketsView {
    pub markets: MarketSnapshot,
    /// A snapshot fetch is in flight
    pub loading: bool,
    /// Last unexpected failure, if any. Never clears `markets`.
    pub error: Option<String>,
    pub is_streaming: bool,
}

/// Markets partitioned by lifecycle state
#[derive(Debug, Clone, Default)]
pub struct MarketsByState {
    pub active: Vec<MarketRecord>,
    pub observing: Vec<MarketRecord>,
    pub resolved: Vec<MarketRecord>,
}

impl MarketsView {
    pub fn market(&self, key: &MarketKey) -> Option<&MarketRecord> {
        self.markets.iter().find(|m| &m.key == key)
    }

    /// Partition by state; a market with no state counts as active
    pub fn by_state(&self) -> MarketsByState {
        let mut grouped = MarketsByState::default();
        for market in self.markets.iter() {
            let bucket = match market.state_or_open() {
                MarketState::Open => &mut grouped.active,
                MarketState::Observing => &mut grouped.observing,
                MarketState::Resolved => &mut grouped.resolved,
            };
            bucket.push(market.clone());
        }
        grouped
    }

    /// Positions placed on `key`
    pub fn positions_for<'a>(
        &self,
        key: &MarketKey,
        positions: &'a [PositionRecord],
    ) -> Vec<&'a PositionRecord> {
        positions.iter().filter(|p| &p.market_key == key).collect()
    }
}

struct ControllerInner {
    config: SyncConfig,
    session: Option<Session>,
    store: Arc<MarketStore>,
    fetcher: SnapshotFetcher,
    stream: StreamClient,
    reconciler: Mutex<EventReconciler>,
    /// Snapshot fetches in flight
    loading: AtomicUsize,
    error: Mutex<Option<String>>,
    cancel: Mutex<CancelFlag>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ControllerInner {
    async fn start_stream(&self, cancel: &CancelFlag) -> bool {
        let sink: Arc<dyn MarketSink> = self.store.clone();
        self.stream
            .start(self.session.as_ref(), sink, cancel.clone())
            .await
    }

    /// Run one progressive fetch on its own task so a panic surfaces as
    /// `error` instead of tearing down the caller.
    async fn refresh(self: &Arc<Self>, cancel: &CancelFlag) -> Option<FetchReport> {
        let Some(session) = self.session.clone() else {
            debug!("No wallet session, skipping snapshot fetch");
            return None;
        };

        let _loading = LoadingGuard::enter(&self.loading);
        *self.error.lock() = None;

        let inner = Arc::clone(self);
        let task_cancel = cancel.clone();
        let result = tokio::spawn(async move {
            inner
                .fetcher
                .fetch_progressive_fallback(&session, inner.store.as_ref(), &task_cancel)
                .await
        })
        .await;

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                let err = SyncError::task(format!("snapshot fetch: {}", e));
                error!("{}", err);
                *self.error.lock() = Some(err.to_string());
                None
            }
        }
    }

    /// Watch the stream and keep snapshots flowing while it is down
    async fn supervise(self: Arc<Self>, cancel: CancelFlag, mut streaming: bool) {
        loop {
            if streaming {
                let reason = self.stream.closed().await;
                if cancel.is_cancelled() || reason == CloseReason::Stopped {
                    break;
                }
                warn!("Market stream closed ({}), falling back to snapshots", reason);
                self.refresh(&cancel).await;
            }

            let Some(interval) = self.config.poll_interval else {
                debug!("Polling disabled, supervisor exiting");
                break;
            };

            tokio::time::sleep(interval).await;
            if cancel.is_cancelled() {
                break;
            }

            streaming = self.start_stream(&cancel).await;
            if streaming {
                info!("Market stream re-established");
            } else {
                self.refresh(&cancel).await;
            }
        }
    }
}

/// Counts one in-flight fetch until dropped, including when the awaiting
/// task is aborted
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Entry point for consumers: one instance per wallet session
pub struct MarketsController {
    inner: Arc<ControllerInner>,
}

impl MarketsController {
    /// Build a controller from explicit collaborators.
    ///
    /// `transport` is `None` when push connections are unsupported; it is
    /// also ignored when `config.stream_enabled` is false.
    pub fn new(
        config: SyncConfig,
        session: Option<Session>,
        api: Arc<dyn MarketsApi>,
        transport: Option<Arc<dyn PushTransport>>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let transport = transport.filter(|_| config.stream_enabled);
        let fetcher = SnapshotFetcher::new(api, Arc::clone(&auth), config.lookback_hours);
        let stream = StreamClient::new(
            transport,
            auth,
            config.lookback_hours,
            config.stream_idle_timeout,
        );

        Self {
            inner: Arc::new(ControllerInner {
                config,
                session,
                store: Arc::new(MarketStore::new()),
                fetcher,
                stream,
                reconciler: Mutex::new(EventReconciler::new()),
                loading: AtomicUsize::new(0),
                error: Mutex::new(None),
                cancel: Mutex::new(CancelFlag::new()),
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Build a controller talking to the configured backend over HTTP
    pub fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let session = config.session()?;

        let api = BackendClient::with_timeout(&config.api_base_url, config.request_timeout)?;
        let transport: Option<Arc<dyn PushTransport>> = if config.stream_enabled {
            Some(Arc::new(SseTransport::new(&config.api_base_url)?))
        } else {
            None
        };

        if config.token.is_none() {
            warn!("MARKETS_JWT is not set, backend requests will be skipped");
        }
        let auth = StaticToken::new(config.token.clone().unwrap_or_default());

        Ok(Self::new(
            config.clone(),
            session,
            Arc::new(api),
            transport,
            Arc::new(auth),
        ))
    }

    /// Start syncing: stream if possible, otherwise fetch snapshots now.
    /// Any previous activation is stopped first.
    #[instrument(skip(self))]
    pub async fn activate(&self) {
        self.deactivate();

        let cancel = CancelFlag::new();
        *self.inner.cancel.lock() = cancel.clone();

        let streaming = self.inner.start_stream(&cancel).await;
        if streaming {
            info!("Markets streaming");
        } else {
            info!("Stream unavailable, fetching snapshots");
            self.inner.refresh(&cancel).await;
        }

        let handle = tokio::spawn(Arc::clone(&self.inner).supervise(cancel, streaming));
        *self.inner.supervisor.lock() = Some(handle);
    }

    /// Stop the stream, polling and any pending commits
    pub fn deactivate(&self) {
        self.inner.cancel.lock().cancel();
        if let Some(handle) = self.inner.supervisor.lock().take() {
            handle.abort();
        }
        self.inner.stream.close();
    }

    /// Fetch all segments once, regardless of stream state
    pub async fn refresh(&self) -> Option<FetchReport> {
        let cancel = self.inner.cancel.lock().clone();
        self.inner.refresh(&cancel).await
    }

    /// Fold on-chain events into the store. Returns the number of changed
    /// records.
    pub fn apply_chain_events(&self, events: &[ChainEvent]) -> usize {
        self.inner
            .reconciler
            .lock()
            .reconcile(events, self.inner.store.as_ref())
    }

    pub fn view(&self) -> MarketsView {
        MarketsView {
            markets: self.inner.store.snapshot(),
            loading: self.inner.loading.load(Ordering::SeqCst) > 0,
            error: self.inner.error.lock().clone(),
            is_streaming: self.inner.stream.is_streaming(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.stream.is_streaming()
    }

    pub fn subscribe(&self) -> watch::Receiver<MarketSnapshot> {
        self.inner.store.subscribe()
    }

    pub fn store(&self) -> &MarketStore {
        &self.inner.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }
}

impl Drop for MarketsController {
    fn drop(&mut self) {
        self.deactivate();
    }
}
