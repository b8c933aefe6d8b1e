//! Market reconciliation engine
//!
//! Three producers feed one store:
//! - [`SnapshotFetcher`] pulls the segmented REST snapshots
//! - [`StreamClient`] relays deltas from the server-sent event stream
//! - [`EventReconciler`] folds on-chain events
//!
//! All of them write through [`MarketSink::emit`], which the [`MarketStore`]
//! implements with a single upsert/merge policy. [`MarketsController`] ties
//! them together and exposes the read surface consumers use.

pub mod cancel;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod reconciler;
pub mod sink;
pub mod store;
pub mod stream_client;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancelFlag;
pub use config::{ConfigError, SyncConfig};
pub use controller::{MarketsByState, MarketsController, MarketsView};
pub use error::SyncError;
pub use fetcher::{FetchReport, SnapshotFetcher};
pub use reconciler::EventReconciler;
pub use sink::MarketSink;
pub use store::{MarketSnapshot, MarketStore, StoreStats};
pub use stream_client::{CloseReason, StreamClient, StreamState};
