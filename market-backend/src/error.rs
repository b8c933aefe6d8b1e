//! Error types for backend calls

use market_core::MarketError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    pub fn network(msg: impl Into<String>) -> Self {
        BackendError::Network(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        BackendError::Auth(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        BackendError::Parse(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        BackendError::Unsupported(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        BackendError::Config(msg.into())
    }
}

impl From<MarketError> for BackendError {
    fn from(e: MarketError) -> Self {
        BackendError::Parse(e.to_string())
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
