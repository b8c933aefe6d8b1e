//! Event Reconciler
//!
//! Folds on-chain market events into the store. Events can arrive late or
//! out of order, so each market remembers the newest `updateTs` applied.

use std::collections::HashMap;

use indexmap::IndexMap;
use market_core::{ChainEvent, MarketKey, MarketPatch};
use tracing::debug;

use crate::sink::MarketSink;

#[derive(Debug, Default)]
pub struct EventReconciler {
    last_applied: HashMap<MarketKey, i64>,
}

impl EventReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project events into patches, one per market.
    ///
    /// Within `events` the greatest `updateTs` per market wins (later entry
    /// on ties). Events older than what a previous call already applied for
    /// the same market are dropped.
    pub fn project(&mut self, events: &[ChainEvent]) -> Vec<MarketPatch> {
        let mut newest: IndexMap<MarketKey, &ChainEvent> = IndexMap::new();

        for event in events {
            let key = event.key();
            match newest.get(&key) {
                Some(current) if current.update_ts > event.update_ts => {}
                _ => {
                    newest.insert(key, event);
                }
            }
        }

        let mut patches = Vec::with_capacity(newest.len());
        for (key, event) in newest {
            if let Some(&applied) = self.last_applied.get(&key) {
                if event.update_ts < applied {
                    debug!(
                        "Dropping stale event for market {} (updateTs {} < {})",
                        key, event.update_ts, applied
                    );
                    continue;
                }
            }
            self.last_applied.insert(key, event.update_ts);
            patches.push(event.to_patch());
        }
        patches
    }

    /// Project `events` and upsert the result. Returns the number of changed
    /// records; empty input touches nothing.
    pub fn reconcile(&mut self, events: &[ChainEvent], sink: &dyn MarketSink) -> usize {
        if events.is_empty() {
            return 0;
        }

        let patches = self.project(events);
        if patches.is_empty() {
            return 0;
        }

        let count = patches.len();
        let changed = sink.emit(patches);
        debug!(
            "Reconciled {} chain events into {} patches, {} changed",
            events.len(),
            count,
            changed
        );
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MarketStore;
    use market_core::{MarketState, WinningDirection};
    use std::sync::Arc;

    fn event(json: &str) -> ChainEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_events_normalised_into_store() {
        let store = MarketStore::new();
        store.upsert_many(vec![MarketPatch {
            market_id: Some("2".to_string()),
            question: Some("Rain in Lisbon by noon?".to_string()),
            ..MarketPatch::default()
        }]);

        let mut reconciler = EventReconciler::new();
        let changed = reconciler.reconcile(
            &[event(r#"{"marketId": 2, "winningDirection": 1, "state": 2, "updateTs": 10}"#)],
            &store,
        );

        assert_eq!(changed, 1);
        let record = store.get(&MarketKey::new("2")).unwrap();
        assert_eq!(record.winning_direction, Some(WinningDirection::Yes));
        assert_eq!(record.state, Some(MarketState::Resolved));
        assert_eq!(record.question.as_deref(), Some("Rain in Lisbon by noon?"));
    }

    #[test]
    fn test_newest_event_per_market_wins() {
        let mut reconciler = EventReconciler::new();
        let patches = reconciler.project(&[
            event(r#"{"marketId": "1", "volume": "30", "updateTs": 30}"#),
            event(r#"{"marketId": "2", "volume": "5", "updateTs": 1}"#),
            event(r#"{"marketId": "1", "volume": "10", "updateTs": 10}"#),
            event(r#"{"marketId": "1", "volume": "31", "updateTs": 30}"#),
        ]);

        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].market_id.as_deref(), Some("1"));
        assert_eq!(patches[0].volume.as_deref(), Some("31"));
        assert_eq!(patches[1].volume.as_deref(), Some("5"));
    }

    #[test]
    fn test_stale_events_dropped_across_calls() {
        let store = MarketStore::new();
        let mut reconciler = EventReconciler::new();

        reconciler.reconcile(&[event(r#"{"marketId": "7", "volume": "100", "updateTs": 50}"#)], &store);
        let changed = reconciler.reconcile(&[event(r#"{"marketId": "7", "volume": "90", "updateTs": 40}"#)], &store);

        assert_eq!(changed, 0);
        let record = store.get(&MarketKey::new("7")).unwrap();
        assert_eq!(record.volume.as_deref(), Some("100"));

        let changed = reconciler.reconcile(&[event(r#"{"marketId": "7", "volume": "120", "updateTs": 60}"#)], &store);
        assert_eq!(changed, 1);
    }

    #[test]
    fn test_empty_input_is_noop() {
        let store = Arc::new(MarketStore::new());
        let before = store.snapshot();
        let mut reconciler = EventReconciler::new();

        assert_eq!(reconciler.reconcile(&[], store.as_ref()), 0);
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }
}
