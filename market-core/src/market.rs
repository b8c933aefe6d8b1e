//! Market data structures for on-chain prediction markets

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{MarketError, MarketResult};

/// Prefix carried by keys generated for records that arrived without any id
pub const GENERATED_KEY_PREFIX: &str = "gen-";

// ============================================================================
// Identity
// ============================================================================

/// Stable identity of a market inside the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketKey(String);

impl MarketKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Build a key for a record that carried no usable id
    pub fn generated(suffix: impl fmt::Display) -> Self {
        Self(format!("{}{}", GENERATED_KEY_PREFIX, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key was generated rather than derived from an id
    pub fn is_generated(&self) -> bool {
        self.0.starts_with(GENERATED_KEY_PREFIX)
    }
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a market key was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// On-chain market id
    MarketId,
    /// Backend database id
    DbId,
}

// ============================================================================
// Lifecycle enums
// ============================================================================

/// Lifecycle state of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketState {
    /// Accepting positions
    Open,
    /// Closed for positions, waiting on the outcome
    Observing,
    /// Outcome known
    Resolved,
}

impl MarketState {
    /// Normalize any of the shapes the backend or chain uses for market state.
    ///
    /// Accepts numeric codes (0 open, 1 observing, 2 resolved), strings
    /// (case-insensitive, `active` is an alias of `open`), and single-key
    /// enum objects such as `{"resolved": {}}`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64()? {
                0 => Some(MarketState::Open),
                1 => Some(MarketState::Observing),
                2 => Some(MarketState::Resolved),
                _ => None,
            },
            Value::String(s) => s.parse().ok(),
            Value::Object(map) if map.len() == 1 => map.keys().next()?.parse().ok(),
            _ => None,
        }
    }
}

impl FromStr for MarketState {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" | "active" | "0" => Ok(MarketState::Open),
            "observing" | "1" => Ok(MarketState::Observing),
            "resolved" | "2" => Ok(MarketState::Resolved),
            other => Err(MarketError::parse(format!("unknown market state: {}", other))),
        }
    }
}

/// Resolved outcome of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinningDirection {
    #[default]
    None,
    Yes,
    No,
    Draw,
}

impl WinningDirection {
    /// Normalize numeric codes (0 none, 1 yes, 2 no, 3 draw), strings and
    /// single-key enum objects such as `{"yes": {}}`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64()? {
                0 => Some(WinningDirection::None),
                1 => Some(WinningDirection::Yes),
                2 => Some(WinningDirection::No),
                3 => Some(WinningDirection::Draw),
                _ => None,
            },
            Value::String(s) => s.parse().ok(),
            Value::Object(map) if map.len() == 1 => map.keys().next()?.parse().ok(),
            _ => None,
        }
    }

    pub fn is_decided(&self) -> bool {
        *self != WinningDirection::None
    }
}

impl FromStr for WinningDirection {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" | "0" => Ok(WinningDirection::None),
            "yes" | "1" => Ok(WinningDirection::Yes),
            "no" | "2" => Ok(WinningDirection::No),
            "draw" | "3" => Ok(WinningDirection::Draw),
            other => Err(MarketError::parse(format!("unknown winning direction: {}", other))),
        }
    }
}

/// Whether a market is running now or scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    Live,
    Future,
}

impl MarketType {
    /// Normalize numeric codes (0 live, 1 future), strings and enum objects
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_u64()? {
                0 => Some(MarketType::Live),
                1 => Some(MarketType::Future),
                _ => None,
            },
            Value::String(s) => s.parse().ok(),
            Value::Object(map) if map.len() == 1 => map.keys().next()?.parse().ok(),
            _ => None,
        }
    }
}

impl FromStr for MarketType {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" | "0" => Ok(MarketType::Live),
            "future" | "1" => Ok(MarketType::Future),
            other => Err(MarketError::parse(format!("unknown market type: {}", other))),
        }
    }
}

// ============================================================================
// Patch (what producers emit)
// ============================================================================

/// A partial market update as emitted by any producer.
///
/// Every attribute is optional: omitted attributes leave the stored value
/// untouched when the patch is merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPatch {
    /// On-chain market id (normalized to its decimal string form)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,

    /// Backend database id, when distinct from the on-chain id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_start: Option<i64>,

    /// Unix seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_end: Option<i64>,

    /// Raw integer amount as a string, unscaled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yes_liquidity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_liquidity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<MarketState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_direction: Option<WinningDirection>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_position_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<MarketType>,

    /// Number of decimals the amounts are expressed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl MarketPatch {
    /// Patch addressed to an on-chain market id
    pub fn for_market(market_id: impl Into<String>) -> Self {
        Self {
            market_id: Some(market_id.into()),
            ..Self::default()
        }
    }

    /// Derive the stable key: on-chain id first, database id second.
    ///
    /// Returns `None` when neither id is present; the caller decides how to
    /// key such a record.
    pub fn stable_key(&self) -> Option<(MarketKey, KeySource)> {
        let non_empty = |id: &Option<String>| {
            id.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(MarketKey::new)
        };

        non_empty(&self.market_id)
            .map(|k| (k, KeySource::MarketId))
            .or_else(|| non_empty(&self.db_id).map(|k| (k, KeySource::DbId)))
    }
}

// ============================================================================
// Record (what the store holds)
// ============================================================================

/// One prediction market as held by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    /// Store identity, never reassigned once set
    pub key: MarketKey,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_start: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_end: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_liquidity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_liquidity: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<MarketState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_direction: Option<WinningDirection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_position_id: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_type: Option<MarketType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl MarketRecord {
    /// Create a record holding exactly the attributes of `patch`
    pub fn from_patch(key: MarketKey, patch: MarketPatch) -> Self {
        Self {
            key,
            market_id: patch.market_id,
            db_id: patch.db_id,
            question: patch.question,
            market_start: patch.market_start,
            market_end: patch.market_end,
            yes_liquidity: patch.yes_liquidity,
            no_liquidity: patch.no_liquidity,
            volume: patch.volume,
            state: patch.state,
            winning_direction: patch.winning_direction,
            next_position_id: patch.next_position_id,
            is_active: patch.is_active,
            market_type: patch.market_type,
            decimals: patch.decimals,
        }
    }

    /// Whether merging `patch` would change any field consumers care about.
    ///
    /// Identity fields and `decimals` are deliberately not compared: a patch
    /// that only restates them is not worth a new snapshot.
    pub fn differs_from(&self, patch: &MarketPatch) -> bool {
        fn changed<T: PartialEq>(current: &Option<T>, incoming: &Option<T>) -> bool {
            incoming.is_some() && current != incoming
        }

        changed(&self.yes_liquidity, &patch.yes_liquidity)
            || changed(&self.no_liquidity, &patch.no_liquidity)
            || changed(&self.volume, &patch.volume)
            || changed(&self.market_start, &patch.market_start)
            || changed(&self.market_end, &patch.market_end)
            || changed(&self.winning_direction, &patch.winning_direction)
            || changed(&self.state, &patch.state)
            || changed(&self.next_position_id, &patch.next_position_id)
            || changed(&self.is_active, &patch.is_active)
            || changed(&self.market_type, &patch.market_type)
            || changed(&self.question, &patch.question)
    }

    /// Shallow merge: attributes present in `patch` win, the rest are kept.
    /// The key is never touched.
    pub fn merge(&mut self, patch: MarketPatch) {
        fn take<T>(slot: &mut Option<T>, incoming: Option<T>) {
            if incoming.is_some() {
                *slot = incoming;
            }
        }

        take(&mut self.market_id, patch.market_id);
        take(&mut self.db_id, patch.db_id);
        take(&mut self.question, patch.question);
        take(&mut self.market_start, patch.market_start);
        take(&mut self.market_end, patch.market_end);
        take(&mut self.yes_liquidity, patch.yes_liquidity);
        take(&mut self.no_liquidity, patch.no_liquidity);
        take(&mut self.volume, patch.volume);
        take(&mut self.state, patch.state);
        take(&mut self.winning_direction, patch.winning_direction);
        take(&mut self.next_position_id, patch.next_position_id);
        take(&mut self.is_active, patch.is_active);
        take(&mut self.market_type, patch.market_type);
        take(&mut self.decimals, patch.decimals);
    }

    /// Lifecycle state, treating an unknown state as open
    pub fn state_or_open(&self) -> MarketState {
        self.state.unwrap_or(MarketState::Open)
    }

    pub fn is_resolved(&self) -> bool {
        self.state == Some(MarketState::Resolved)
    }

    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        self.market_start.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.market_end.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn scaled_yes_liquidity(&self) -> MarketResult<Option<Decimal>> {
        scale_amount(self.yes_liquidity.as_deref(), self.decimals)
    }

    pub fn scaled_no_liquidity(&self) -> MarketResult<Option<Decimal>> {
        scale_amount(self.no_liquidity.as_deref(), self.decimals)
    }

    pub fn scaled_volume(&self) -> MarketResult<Option<Decimal>> {
        scale_amount(self.volume.as_deref(), self.decimals)
    }

    /// Sum of both liquidity pools in display units (missing sides count as zero)
    pub fn total_liquidity(&self) -> MarketResult<Decimal> {
        let yes = self.scaled_yes_liquidity()?.unwrap_or(Decimal::ZERO);
        let no = self.scaled_no_liquidity()?.unwrap_or(Decimal::ZERO);
        Ok(yes + no)
    }
}

/// Convert a raw integer amount string into display units
pub fn scale_amount(raw: Option<&str>, decimals: Option<u32>) -> MarketResult<Option<Decimal>> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| MarketError::invalid_amount(format!("{}: {}", raw, e)))?;

    match decimals {
        None | Some(0) => Ok(Some(amount)),
        Some(d) => Decimal::TEN
            .checked_powu(u64::from(d))
            .and_then(|scale| amount.checked_div(scale))
            .map(Some)
            .ok_or_else(|| MarketError::invalid_amount(format!("{} overflows at {} decimals", raw, d))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn record(id: &str) -> MarketRecord {
        MarketRecord::from_patch(
            MarketKey::new(id),
            MarketPatch {
                market_id: Some(id.to_string()),
                question: Some("Will it rain in Lisbon?".to_string()),
                yes_liquidity: Some("100".to_string()),
                no_liquidity: Some("50".to_string()),
                winning_direction: Some(WinningDirection::None),
                ..MarketPatch::default()
            },
        )
    }

    #[test]
    fn test_stable_key_prefers_market_id() {
        let patch = MarketPatch {
            market_id: Some("7".to_string()),
            db_id: Some("abc".to_string()),
            ..MarketPatch::default()
        };
        assert_eq!(
            patch.stable_key(),
            Some((MarketKey::new("7"), KeySource::MarketId))
        );

        let patch = MarketPatch {
            market_id: Some("  ".to_string()),
            db_id: Some("abc".to_string()),
            ..MarketPatch::default()
        };
        assert_eq!(patch.stable_key(), Some((MarketKey::new("abc"), KeySource::DbId)));

        assert_eq!(MarketPatch::default().stable_key(), None);
    }

    #[test]
    fn test_generated_key_is_flagged() {
        let key = MarketKey::generated("1234");
        assert!(key.is_generated());
        assert!(!MarketKey::new("1").is_generated());
    }

    #[test]
    fn test_differs_ignores_identity_and_decimals() {
        let existing = record("1");
        let patch = MarketPatch {
            market_id: Some("1".to_string()),
            db_id: Some("db-1".to_string()),
            decimals: Some(6),
            yes_liquidity: Some("100".to_string()),
            ..MarketPatch::default()
        };
        assert!(!existing.differs_from(&patch));

        let patch = MarketPatch {
            no_liquidity: Some("51".to_string()),
            ..MarketPatch::default()
        };
        assert!(existing.differs_from(&patch));
    }

    #[test]
    fn test_merge_keeps_omitted_fields() {
        let mut existing = record("1");
        existing.merge(MarketPatch {
            winning_direction: Some(WinningDirection::Yes),
            state: Some(MarketState::Resolved),
            ..MarketPatch::default()
        });

        assert_eq!(existing.winning_direction, Some(WinningDirection::Yes));
        assert_eq!(existing.question.as_deref(), Some("Will it rain in Lisbon?"));
        assert_eq!(existing.yes_liquidity.as_deref(), Some("100"));
        assert_eq!(existing.key, MarketKey::new("1"));
        assert!(existing.is_resolved());
    }

    #[test]
    fn test_direction_normalization() {
        assert_eq!(WinningDirection::from_json(&json!(1)), Some(WinningDirection::Yes));
        assert_eq!(WinningDirection::from_json(&json!("No")), Some(WinningDirection::No));
        assert_eq!(
            WinningDirection::from_json(&json!({ "draw": {} })),
            Some(WinningDirection::Draw)
        );
        assert_eq!(WinningDirection::from_json(&json!(9)), None);
        assert_eq!(WinningDirection::from_json(&json!([1])), None);
    }

    #[test]
    fn test_state_normalization() {
        assert_eq!(MarketState::from_json(&json!("active")), Some(MarketState::Open));
        assert_eq!(MarketState::from_json(&json!(1)), Some(MarketState::Observing));
        assert_eq!(
            MarketState::from_json(&json!({ "Resolved": {} })),
            Some(MarketState::Resolved)
        );
    }

    #[test]
    fn test_scaled_amounts() {
        let mut market = record("1");
        market.decimals = Some(2);
        assert_eq!(market.scaled_yes_liquidity().unwrap(), Some(dec!(1.00)));
        assert_eq!(market.total_liquidity().unwrap(), dec!(1.50));

        market.volume = Some("not-a-number".to_string());
        assert!(market.scaled_volume().is_err());
        assert_eq!(scale_amount(None, Some(6)).unwrap(), None);
    }

    #[test]
    fn test_out_of_range_decimals_rejected() {
        let mut market = record("1");
        market.decimals = Some(28);
        assert!(market.total_liquidity().is_ok());

        market.decimals = Some(29);
        assert!(matches!(
            market.total_liquidity(),
            Err(MarketError::InvalidAmount(_))
        ));
        assert!(scale_amount(Some("1"), Some(u32::MAX)).is_err());
    }
}
