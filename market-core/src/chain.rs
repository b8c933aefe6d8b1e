//! On-chain market events
//!
//! Events come from a program-account subscription owned by the caller. Only
//! the fields that describe market state are kept.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MarketError;
use crate::market::{MarketKey, MarketPatch, MarketState, WinningDirection};
use crate::wire::{amount_string, id_string, int_value};

/// A market-state event observed on chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawChainEvent", rename_all = "camelCase")]
pub struct ChainEvent {
    pub market_id: String,
    pub yes_liquidity: Option<String>,
    pub no_liquidity: Option<String>,
    pub volume: Option<String>,
    pub market_start: Option<i64>,
    pub market_end: Option<i64>,
    pub winning_direction: Option<WinningDirection>,
    pub state: Option<MarketState>,
    pub next_position_id: Option<u64>,
    /// Chain timestamp of the update; events without one sort first
    pub update_ts: i64,
}

impl ChainEvent {
    pub fn key(&self) -> MarketKey {
        MarketKey::new(self.market_id.clone())
    }

    /// Project the event onto the store's patch shape
    pub fn to_patch(&self) -> MarketPatch {
        MarketPatch {
            market_id: Some(self.market_id.clone()),
            yes_liquidity: self.yes_liquidity.clone(),
            no_liquidity: self.no_liquidity.clone(),
            volume: self.volume.clone(),
            market_start: self.market_start,
            market_end: self.market_end,
            winning_direction: self.winning_direction,
            state: self.state,
            next_position_id: self.next_position_id,
            ..MarketPatch::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChainEvent {
    #[serde(default)]
    market_id: Option<Value>,
    #[serde(default)]
    yes_liquidity: Option<Value>,
    #[serde(default)]
    no_liquidity: Option<Value>,
    #[serde(default)]
    volume: Option<Value>,
    #[serde(default)]
    market_start: Option<Value>,
    #[serde(default)]
    market_end: Option<Value>,
    #[serde(default)]
    winning_direction: Option<Value>,
    #[serde(default)]
    state: Option<Value>,
    #[serde(default)]
    next_position_id: Option<Value>,
    #[serde(default)]
    update_ts: Option<Value>,
}

impl TryFrom<RawChainEvent> for ChainEvent {
    type Error = MarketError;

    fn try_from(raw: RawChainEvent) -> Result<Self, Self::Error> {
        let market_id = raw
            .market_id
            .as_ref()
            .and_then(id_string)
            .ok_or(MarketError::MissingIdentity)?;

        Ok(Self {
            market_id,
            yes_liquidity: raw.yes_liquidity.as_ref().and_then(amount_string),
            no_liquidity: raw.no_liquidity.as_ref().and_then(amount_string),
            volume: raw.volume.as_ref().and_then(amount_string),
            market_start: raw.market_start.as_ref().and_then(int_value),
            market_end: raw.market_end.as_ref().and_then(int_value),
            winning_direction: raw
                .winning_direction
                .as_ref()
                .and_then(WinningDirection::from_json),
            state: raw.state.as_ref().and_then(MarketState::from_json),
            next_position_id: raw
                .next_position_id
                .as_ref()
                .and_then(int_value)
                .and_then(|v| u64::try_from(v).ok()),
            update_ts: raw.update_ts.as_ref().and_then(int_value).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chain_event() {
        let json = r#"{
            "marketId": "0x02",
            "yesLiquidity": "0x3e8",
            "noLiquidity": 250,
            "volume": "1250",
            "marketStart": 1717000000,
            "marketEnd": 1717003600,
            "winningDirection": { "yes": {} },
            "state": 2,
            "nextPositionId": 14,
            "updateTs": "1717003700"
        }"#;

        let event: ChainEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.market_id, "2");
        assert_eq!(event.yes_liquidity.as_deref(), Some("1000"));
        assert_eq!(event.no_liquidity.as_deref(), Some("250"));
        assert_eq!(event.winning_direction, Some(WinningDirection::Yes));
        assert_eq!(event.state, Some(MarketState::Resolved));
        assert_eq!(event.update_ts, 1717003700);

        let patch = event.to_patch();
        assert_eq!(patch.market_id.as_deref(), Some("2"));
        assert_eq!(patch.question, None);
        assert_eq!(patch.next_position_id, Some(14));
    }

    #[test]
    fn test_event_without_market_id_rejected() {
        let result = serde_json::from_str::<ChainEvent>(r#"{"volume": "1"}"#);
        assert!(result.is_err());
    }
}
