//! Fakes shared by the unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use market_backend::{
    AuthProvider, BackendError, BackendResult, EventStream, MarketsApi, PushTransport, Segment,
    Session, SseEvent, StreamRequest, WalletAddress,
};
use market_core::MarketPatch;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const WALLET: &str = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";

pub fn session() -> Session {
    Session::new(WalletAddress::parse(WALLET).unwrap())
}

pub fn market(id: &str, yes: &str, no: &str, volume: &str) -> MarketPatch {
    MarketPatch {
        market_id: Some(id.to_string()),
        yes_liquidity: Some(yes.to_string()),
        no_liquidity: Some(no.to_string()),
        volume: Some(volume.to_string()),
        ..MarketPatch::default()
    }
}

pub fn sse(event: &str, data: &str) -> SseEvent {
    SseEvent {
        event: event.to_string(),
        data: data.to_string(),
        id: None,
    }
}

// ============================================================================
// Auth
// ============================================================================

pub struct FakeAuth {
    token: Option<String>,
    pub requests: AtomicUsize,
}

impl FakeAuth {
    pub fn ok(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            token: None,
            requests: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AuthProvider for FakeAuth {
    async fn token(&self) -> BackendResult<String> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.token
            .clone()
            .ok_or_else(|| BackendError::auth("session expired"))
    }
}

// ============================================================================
// REST
// ============================================================================

#[derive(Default)]
pub struct FakeApi {
    responses: Mutex<HashMap<Segment, BackendResult<Vec<MarketPatch>>>>,
    calls: Mutex<Vec<Segment>>,
    last_hours: Mutex<Option<u32>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, segment: Segment, response: BackendResult<Vec<MarketPatch>>) {
        self.responses.lock().insert(segment, response);
    }

    pub fn calls(&self) -> Vec<Segment> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, segment: Segment) -> usize {
        self.calls.lock().iter().filter(|s| **s == segment).count()
    }

    pub fn last_hours_seen(&self) -> Option<u32> {
        *self.last_hours.lock()
    }
}

#[async_trait]
impl MarketsApi for FakeApi {
    async fn fetch_segment(
        &self,
        segment: Segment,
        last_hours: u32,
        _token: &str,
        _wallet: &WalletAddress,
    ) -> BackendResult<Vec<MarketPatch>> {
        self.calls.lock().push(segment);
        if segment == Segment::Resolved {
            *self.last_hours.lock() = Some(last_hours);
        }
        self.responses
            .lock()
            .get(&segment)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ============================================================================
// Push transport
// ============================================================================

pub struct FakeTransport {
    script: Mutex<Vec<BackendResult<SseEvent>>>,
    open_error: Option<BackendError>,
    hold_open: bool,
    opens: AtomicUsize,
}

impl FakeTransport {
    /// Replays `events` on the first open, then stays open if `hold_open`
    pub fn scripted(events: Vec<BackendResult<SseEvent>>, hold_open: bool) -> Self {
        Self {
            script: Mutex::new(events),
            open_error: None,
            hold_open,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            open_error: Some(error),
            hold_open: false,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn open(&self, _request: &StreamRequest) -> BackendResult<EventStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.open_error {
            return Err(e.clone());
        }

        let events = std::mem::take(&mut *self.script.lock());
        let replay = stream::iter(events);
        if self.hold_open {
            Ok(Box::pin(replay.chain(stream::pending())))
        } else {
            Ok(Box::pin(replay))
        }
    }
}

/// Transport whose frames are pushed by the test through a channel
pub struct ChannelTransport {
    rx: Mutex<Option<mpsc::UnboundedReceiver<BackendResult<SseEvent>>>>,
    gate: Option<Arc<Notify>>,
    opens: AtomicUsize,
}

pub type FrameSender = mpsc::UnboundedSender<BackendResult<SseEvent>>;

impl ChannelTransport {
    pub fn new() -> (Self, FrameSender) {
        Self::build(None)
    }

    /// `open` blocks until `gate` is notified
    pub fn gated(gate: Arc<Notify>) -> (Self, FrameSender) {
        Self::build(Some(gate))
    }

    fn build(gate: Option<Arc<Notify>>) -> (Self, FrameSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            rx: Mutex::new(Some(rx)),
            gate,
            opens: AtomicUsize::new(0),
        };
        (transport, tx)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTransport for ChannelTransport {
    async fn open(&self, _request: &StreamRequest) -> BackendResult<EventStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let rx = self.rx.lock().take();
        match rx {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None => Err(BackendError::unsupported("channel already opened")),
        }
    }
}
