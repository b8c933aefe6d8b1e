//! Stream Client
//!
//! Relays deltas from the market stream into the store while a session is
//! available.
//!
//! State machine (one connection attempt):
//!
//! | From         | Trigger                                   | To           |
//! |--------------|-------------------------------------------|--------------|
//! | `Idle`       | `start` with session + transport          | `Connecting` |
//! | `Closed`     | `start` with session + transport          | `Connecting` |
//! | `Connecting` | transport opened                          | `Streaming`  |
//! | `Connecting` | token or open failure                     | `Closed`     |
//! | `Streaming`  | `end` event                               | `Closed`     |
//! | `Streaming`  | transport error, EOF or idle timeout      | `Closed`     |
//! | any          | `close`                                   | `Closed`     |
//!
//! `Closed` is terminal for the attempt. The owner decides whether to call
//! `start` again or fall back to snapshot fetches.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use market_backend::{
    AuthProvider, EventStream, PushTransport, Session, SseEvent, StreamEventKind, StreamRequest,
};
use market_core::parse_market_list;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::sink::MarketSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Closed,
}

/// Why a stream attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Closed by the owner
    Stopped,
    /// Never opened: no token or the transport refused
    OpenFailed,
    /// Server sent `end`
    RemoteEnd,
    /// Transport error or the connection dropped
    TransportError,
    /// No frame within the idle timeout
    IdleTimeout,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Stopped => "stopped",
            CloseReason::OpenFailed => "open failed",
            CloseReason::RemoteEnd => "remote end",
            CloseReason::TransportError => "transport error",
            CloseReason::IdleTimeout => "idle timeout",
        };
        f.write_str(s)
    }
}

struct StreamShared {
    state: Mutex<StreamState>,
    streaming: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed_tx: watch::Sender<Option<CloseReason>>,
}

impl StreamShared {
    /// Move to `Closed` once per attempt and publish the reason
    fn finish(&self, reason: CloseReason) {
        let mut state = self.state.lock();
        self.finish_locked(&mut state, reason);
    }

    fn finish_locked(&self, state: &mut StreamState, reason: CloseReason) {
        if *state == StreamState::Closed {
            return;
        }
        *state = StreamState::Closed;
        self.streaming.store(false, Ordering::SeqCst);
        self.closed_tx.send_replace(Some(reason));
        info!("Market stream closed ({})", reason);
    }
}

pub struct StreamClient {
    transport: Option<Arc<dyn PushTransport>>,
    auth: Arc<dyn AuthProvider>,
    last_hours: u32,
    idle_timeout: Option<Duration>,
    shared: Arc<StreamShared>,
}

impl StreamClient {
    /// `transport` is `None` when the runtime has no push connection support
    pub fn new(
        transport: Option<Arc<dyn PushTransport>>,
        auth: Arc<dyn AuthProvider>,
        last_hours: u32,
        idle_timeout: Option<Duration>,
    ) -> Self {
        let (closed_tx, _) = watch::channel(None);

        Self {
            transport,
            auth,
            last_hours,
            idle_timeout,
            shared: Arc::new(StreamShared {
                state: Mutex::new(StreamState::Idle),
                streaming: AtomicBool::new(false),
                pump: Mutex::new(None),
                closed_tx,
            }),
        }
    }

    pub fn state(&self) -> StreamState {
        *self.shared.state.lock()
    }

    pub fn is_streaming(&self) -> bool {
        self.shared.streaming.load(Ordering::SeqCst)
    }

    /// Try to open the stream and start relaying into `sink`.
    ///
    /// Returns `false` without raising when any precondition fails (no
    /// session, no transport, no token) or the transport refuses to open;
    /// the caller should fall back to snapshot fetches.
    pub async fn start(
        &self,
        session: Option<&Session>,
        sink: Arc<dyn MarketSink>,
        cancel: CancelFlag,
    ) -> bool {
        if self.is_streaming() {
            return true;
        }

        let Some(session) = session else {
            debug!("No wallet session, not starting market stream");
            return false;
        };
        let Some(transport) = self.transport.clone() else {
            debug!("No push transport available, not starting market stream");
            return false;
        };

        {
            let mut state = self.shared.state.lock();
            if *state == StreamState::Connecting {
                return false;
            }
            *state = StreamState::Connecting;
            self.shared.closed_tx.send_replace(None);
        }

        let token = match self.auth.token().await {
            Ok(token) => token,
            Err(e) => {
                warn!("No token for market stream: {}", e);
                self.shared.finish(CloseReason::OpenFailed);
                return false;
            }
        };

        let request = StreamRequest {
            last_hours: self.last_hours,
            token,
            wallet: session.wallet.clone(),
        };

        let events = match transport.open(&request).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Failed to open market stream: {}", e);
                self.shared.finish(CloseReason::OpenFailed);
                return false;
            }
        };

        // The pump handle is stored under the state lock so a concurrent
        // close() either prevents the spawn or sees the handle to abort.
        let mut state = self.shared.state.lock();
        if *state != StreamState::Connecting || cancel.is_cancelled() {
            self.shared.finish_locked(&mut state, CloseReason::Stopped);
            return false;
        }
        *state = StreamState::Streaming;
        self.shared.streaming.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let idle_timeout = self.idle_timeout;
        let handle = tokio::spawn(async move {
            let reason = pump(events, sink.as_ref(), &cancel, idle_timeout).await;
            shared.finish(reason);
        });
        *self.shared.pump.lock() = Some(handle);

        true
    }

    /// Release the connection and mark the client not streaming.
    /// Safe to call repeatedly or before any `start`.
    pub fn close(&self) {
        let mut state = self.shared.state.lock();
        if let Some(handle) = self.shared.pump.lock().take() {
            handle.abort();
        }
        if *state != StreamState::Idle {
            self.shared.finish_locked(&mut state, CloseReason::Stopped);
        }
        self.shared.streaming.store(false, Ordering::SeqCst);
    }

    /// Wait for the current attempt to close
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.shared.closed_tx.subscribe();
        let reason = match rx.wait_for(|reason| reason.is_some()).await {
            Ok(reason) => *reason,
            Err(_) => None,
        };
        reason.unwrap_or(CloseReason::Stopped)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Some(handle) = self.shared.pump.lock().take() {
            handle.abort();
        }
    }
}

/// Drain `events` into `sink` until the stream ends
async fn pump(
    mut events: EventStream,
    sink: &dyn MarketSink,
    cancel: &CancelFlag,
    idle_timeout: Option<Duration>,
) -> CloseReason {
    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, events.next()).await {
                Ok(next) => next,
                Err(_) => {
                    warn!("Market stream idle for {:?}, closing", limit);
                    return CloseReason::IdleTimeout;
                }
            },
            None => events.next().await,
        };

        let event = match next {
            Some(Ok(event)) => event,
            Some(Err(e)) => {
                warn!("Market stream error: {}", e);
                return CloseReason::TransportError;
            }
            None => {
                info!("Market stream ended without an end event");
                return CloseReason::TransportError;
            }
        };

        if cancel.is_cancelled() {
            debug!("Discarding {} event, stream was cancelled", event.event);
            return CloseReason::Stopped;
        }

        if let Some(reason) = relay(&event, sink) {
            return reason;
        }
    }
}

/// Apply one frame; `Some` means the stream should close
fn relay(event: &SseEvent, sink: &dyn MarketSink) -> Option<CloseReason> {
    if event.is_comment() {
        return None;
    }

    let Some(kind) = StreamEventKind::from_name(&event.event) else {
        debug!("Ignoring unknown stream event '{}'", event.event);
        return None;
    };

    if !kind.carries_markets() {
        return Some(CloseReason::RemoteEnd);
    }

    match parse_market_list(&event.data) {
        Ok(batch) => {
            if batch.skipped > 0 {
                warn!(
                    "Skipped {} malformed entries in '{}' event",
                    batch.skipped, event.event
                );
            }
            let count = batch.patches.len();
            let changed = sink.emit(batch.patches);
            debug!("'{}' event: {} markets, {} changed", event.event, count, changed);
        }
        Err(e) => warn!("Dropping '{}' event: {}", event.event, e),
    }
    None
}
