//! Backend wire format for market objects
//!
//! The REST and stream endpoints return loosely-typed JSON: ids and amounts
//! arrive as numbers, decimal strings or hex strings, and enums arrive as
//! codes, strings or enum objects. Everything is normalized here so the rest
//! of the workspace only sees [`MarketPatch`].

use serde::Deserialize;
use serde_json::Value;

use crate::error::{MarketError, MarketResult};
use crate::market::{MarketPatch, MarketState, MarketType, WinningDirection};

/// A market object exactly as the backend sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    #[serde(default)]
    pub market_id: Option<Value>,

    /// Database id (`id` or `_id` depending on the endpoint)
    #[serde(default, rename = "id", alias = "_id")]
    pub db_id: Option<Value>,

    #[serde(default)]
    pub question: Option<String>,

    #[serde(default)]
    pub market_start: Option<Value>,

    #[serde(default)]
    pub market_end: Option<Value>,

    #[serde(default)]
    pub yes_liquidity: Option<Value>,

    #[serde(default)]
    pub no_liquidity: Option<Value>,

    #[serde(default)]
    pub volume: Option<Value>,

    #[serde(default, alias = "marketState")]
    pub state: Option<Value>,

    #[serde(default)]
    pub winning_direction: Option<Value>,

    #[serde(default)]
    pub next_position_id: Option<Value>,

    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(default)]
    pub market_type: Option<Value>,

    #[serde(default)]
    pub decimals: Option<Value>,
}

impl RawMarket {
    /// Normalize into a patch. Unparseable attributes are dropped, never guessed.
    pub fn into_patch(self) -> MarketPatch {
        MarketPatch {
            market_id: self.market_id.as_ref().and_then(id_string),
            db_id: self.db_id.as_ref().and_then(id_string),
            question: self.question,
            market_start: self.market_start.as_ref().and_then(int_value),
            market_end: self.market_end.as_ref().and_then(int_value),
            yes_liquidity: self.yes_liquidity.as_ref().and_then(amount_string),
            no_liquidity: self.no_liquidity.as_ref().and_then(amount_string),
            volume: self.volume.as_ref().and_then(amount_string),
            state: self.state.as_ref().and_then(MarketState::from_json),
            winning_direction: self
                .winning_direction
                .as_ref()
                .and_then(WinningDirection::from_json),
            next_position_id: self
                .next_position_id
                .as_ref()
                .and_then(int_value)
                .and_then(|v| u64::try_from(v).ok()),
            is_active: self.is_active,
            market_type: self.market_type.as_ref().and_then(MarketType::from_json),
            decimals: self
                .decimals
                .as_ref()
                .and_then(int_value)
                .and_then(|v| u32::try_from(v).ok()),
        }
    }
}

/// Result of parsing a list of market objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketBatch {
    pub patches: Vec<MarketPatch>,
    /// Entries that were null or not market objects
    pub skipped: usize,
}

/// Parse already-decoded JSON values, skipping null and malformed entries
pub fn parse_market_values(values: Vec<Value>) -> MarketBatch {
    let mut batch = MarketBatch::default();

    for value in values {
        if !value.is_object() {
            batch.skipped += 1;
            continue;
        }
        match serde_json::from_value::<RawMarket>(value) {
            Ok(raw) => batch.patches.push(raw.into_patch()),
            Err(_) => batch.skipped += 1,
        }
    }

    batch
}

/// Parse a JSON array payload (as carried by REST bodies and stream events)
pub fn parse_market_list(payload: &str) -> MarketResult<MarketBatch> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| MarketError::parse(format!("invalid market payload: {}", e)))?;

    match value {
        Value::Array(values) => Ok(parse_market_values(values)),
        Value::Null => Ok(MarketBatch::default()),
        other => Err(MarketError::parse(format!(
            "expected a JSON array of markets, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Scalar helpers
// ============================================================================

/// Id as its canonical string form
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else if let Some(decimal) = hex_to_decimal(s) {
                Some(decimal)
            } else {
                Some(s.to_string())
            }
        }
        _ => None,
    }
}

/// Integer amount as a decimal string, preserving precision
pub fn amount_string(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(hex_to_decimal(s).unwrap_or_else(|| s.to_string()))
            }
        }
        _ => None,
    }
}

/// Integer from a number, decimal string or hex string
pub fn int_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| hex_to_decimal(s).and_then(|d| d.parse().ok()))
        }
        _ => None,
    }
}

fn hex_to_decimal(s: &str) -> Option<String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    u128::from_str_radix(digits, 16).ok().map(|v| v.to_string())
}
