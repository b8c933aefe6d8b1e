//! Market Store
//!
//! The single source of truth for every known market, keyed by
//! [`MarketKey`]. Writers go through [`MarketStore::upsert_many`]; readers get
//! immutable snapshots, either on demand or by subscribing.

use std::sync::Arc;

use indexmap::IndexMap;
use market_core::{MarketKey, MarketPatch, MarketRecord, MarketState};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::sink::MarketSink;

/// Immutable point-in-time view of all markets, in first-seen order
pub type MarketSnapshot = Arc<[MarketRecord]>;

#[derive(Debug, Default)]
struct StoreInner {
    markets: IndexMap<MarketKey, MarketRecord>,
    fallback_keys: u64,
    applied: u64,
    skipped: u64,
}

/// In-memory market store with upsert-with-merge semantics
pub struct MarketStore {
    inner: RwLock<StoreInner>,
    snapshot_tx: watch::Sender<MarketSnapshot>,
}

impl MarketStore {
    pub fn new() -> Self {
        let empty: MarketSnapshot = Arc::from(Vec::new());
        let (snapshot_tx, _) = watch::channel(empty);

        Self {
            inner: RwLock::new(StoreInner::default()),
            snapshot_tx,
        }
    }

    /// Insert or merge a batch of patches, in order.
    ///
    /// `None` entries are skipped. A patch whose relevant fields all match
    /// the stored record is not written. A new snapshot is published only if
    /// at least one record changed. Returns the number of changed records.
    pub fn upsert_many<I, P>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<Option<MarketPatch>>,
    {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let mut changed = 0usize;

        for patch in records
            .into_iter()
            .filter_map(Into::<Option<MarketPatch>>::into)
        {
            let key = match patch.stable_key() {
                Some((key, _)) => key,
                None => {
                    let key = MarketKey::generated(Uuid::new_v4().simple());
                    inner.fallback_keys += 1;
                    warn!(
                        "Market without marketId or db id, keyed as {} (question: {:?})",
                        key, patch.question
                    );
                    key
                }
            };

            match inner.markets.get_mut(&key) {
                None => {
                    inner
                        .markets
                        .insert(key.clone(), MarketRecord::from_patch(key, patch));
                    changed += 1;
                }
                Some(existing) if existing.differs_from(&patch) => {
                    existing.merge(patch);
                    changed += 1;
                }
                Some(_) => {
                    inner.skipped += 1;
                }
            }
        }

        if changed > 0 {
            inner.applied += changed as u64;
            let snapshot: MarketSnapshot = inner.markets.values().cloned().collect();
            debug!(
                "Store updated: {} changed, {} total markets",
                changed,
                snapshot.len()
            );
            // Published under the write lock so subscribers never see
            // snapshots out of order.
            self.snapshot_tx.send_replace(snapshot);
        }

        changed
    }

    /// Current snapshot. Unchanged upserts return the same `Arc`.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receive every new snapshot
    pub fn subscribe(&self) -> watch::Receiver<MarketSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn get(&self, key: &MarketKey) -> Option<MarketRecord> {
        self.inner.read().markets.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();

        let count_state = |state: MarketState| {
            inner
                .markets
                .values()
                .filter(|m| m.state_or_open() == state)
                .count()
        };

        StoreStats {
            total: inner.markets.len(),
            open: count_state(MarketState::Open),
            observing: count_state(MarketState::Observing),
            resolved: count_state(MarketState::Resolved),
            fallback_keys: inner.fallback_keys,
            applied: inner.applied,
            skipped: inner.skipped,
        }
    }
}

impl Default for MarketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketSink for MarketStore {
    fn emit(&self, records: Vec<MarketPatch>) -> usize {
        self.upsert_many(records)
    }
}

/// Store statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub open: usize,
    pub observing: usize,
    pub resolved: usize,
    /// Records keyed by a generated key because they carried no id
    pub fallback_keys: u64,
    /// Inserts and merges applied since creation
    pub applied: u64,
    /// Patches dropped because nothing relevant changed
    pub skipped: u64,
}
