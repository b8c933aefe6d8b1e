//! Markets backend integration
//!
//! This crate talks to the markets backend over plain HTTP:
//! - segmented REST snapshots (`/markets/active`, `/markets/observing`,
//!   `/markets/resolved`)
//! - the server-sent event stream (`/markets/stream`)
//!
//! Both sides sit behind traits ([`MarketsApi`], [`PushTransport`]) so the
//! sync engine can run against fakes in tests.

pub mod auth;
pub mod client;
pub mod error;
pub mod sse;
pub mod stream;
pub mod types;

pub use auth::{AuthProvider, Session, StaticToken, WalletAddress};
pub use client::{BackendClient, MarketsApi};
pub use error::{BackendError, BackendResult};
pub use sse::{SseDecoder, SseEvent};
pub use stream::{EventStream, PushTransport, SseTransport};
pub use types::{Segment, StreamEventKind, StreamRequest, DEFAULT_LOOKBACK_HOURS};
