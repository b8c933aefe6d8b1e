//! Error types for market data

use thiserror::Error;

/// Errors raised while turning wire data into market types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing market identity")]
    MissingIdentity,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

impl MarketError {
    pub fn parse(msg: impl Into<String>) -> Self {
        MarketError::Parse(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        MarketError::InvalidAmount(msg.into())
    }
}

/// Result type alias for market operations
pub type MarketResult<T> = Result<T, MarketError>;
