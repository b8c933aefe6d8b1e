//! Producer-facing write capability

use market_core::MarketPatch;

/// Where producers deliver market patches.
///
/// Producers never see the store's map; they only get this capability.
pub trait MarketSink: Send + Sync {
    /// Apply a batch, returning how many records changed
    fn emit(&self, records: Vec<MarketPatch>) -> usize;
}
