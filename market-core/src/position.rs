//! Position structures

use crate::market::{MarketKey, MarketRecord, WinningDirection};
use serde::{Deserialize, Serialize};

/// Side a position was placed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Yes,
    No,
}

impl Direction {
    fn wins_on(&self, outcome: WinningDirection) -> bool {
        matches!(
            (self, outcome),
            (Direction::Yes, WinningDirection::Yes) | (Direction::No, WinningDirection::No)
        )
    }
}

/// A user's position in a market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    /// Market this position belongs to
    pub market_key: MarketKey,

    /// Position counter value assigned by the market
    pub position_id: u64,

    pub direction: Direction,

    /// Raw integer amount as a string, unscaled
    pub amount: String,

    #[serde(default)]
    pub claimed: bool,
}

impl PositionRecord {
    /// Whether `market` is this position's market and resolved in its favour
    pub fn is_winning(&self, market: &MarketRecord) -> bool {
        market.key == self.market_key
            && market.is_resolved()
            && market
                .winning_direction
                .map(|outcome| self.direction.wins_on(outcome))
                .unwrap_or(false)
    }

    /// Winning positions and refunds on a draw can be claimed once
    pub fn is_claimable(&self, market: &MarketRecord) -> bool {
        if self.claimed || market.key != self.market_key || !market.is_resolved() {
            return false;
        }
        self.is_winning(market) || market.winning_direction == Some(WinningDirection::Draw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{MarketPatch, MarketState};

    fn resolved(id: &str, outcome: WinningDirection) -> MarketRecord {
        MarketRecord::from_patch(
            MarketKey::new(id),
            MarketPatch {
                market_id: Some(id.to_string()),
                state: Some(MarketState::Resolved),
                winning_direction: Some(outcome),
                ..MarketPatch::default()
            },
        )
    }

    fn position(id: &str, direction: Direction) -> PositionRecord {
        PositionRecord {
            market_key: MarketKey::new(id),
            position_id: 3,
            direction,
            amount: "5000000".to_string(),
            claimed: false,
        }
    }

    #[test]
    fn test_winning_position() {
        let market = resolved("4", WinningDirection::No);
        assert!(position("4", Direction::No).is_winning(&market));
        assert!(!position("4", Direction::Yes).is_winning(&market));
        assert!(!position("5", Direction::No).is_winning(&market));
    }

    #[test]
    fn test_claimable_on_draw_and_not_twice() {
        let market = resolved("4", WinningDirection::Draw);
        let mut pos = position("4", Direction::Yes);
        assert!(pos.is_claimable(&market));

        pos.claimed = true;
        assert!(!pos.is_claimable(&market));
    }
}
