//! Session and token acquisition

use async_trait::async_trait;
use std::fmt;

use crate::error::{BackendError, BackendResult};

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58 wallet public key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Validate a base58 public key (32-byte keys encode to 32..=44 chars)
    pub fn parse(s: &str) -> BackendResult<Self> {
        let s = s.trim();
        if !(32..=44).contains(&s.len()) {
            return Err(BackendError::config(format!(
                "wallet address must be 32-44 base58 characters, got {}",
                s.len()
            )));
        }
        if let Some(bad) = s.chars().find(|c| !BASE58_ALPHABET.contains(*c)) {
            return Err(BackendError::config(format!(
                "wallet address contains non-base58 character '{}'",
                bad
            )));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A signed-in wallet session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub wallet: WalletAddress,
}

impl Session {
    pub fn new(wallet: WalletAddress) -> Self {
        Self { wallet }
    }
}

/// Source of bearer tokens for backend calls.
///
/// Called once per request: implementations may refresh or re-sign as
/// needed, and a failure only aborts the call that asked.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn token(&self) -> BackendResult<String>;
}

/// Fixed token, typically loaded from the environment
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(..)")
    }
}

#[async_trait]
impl AuthProvider for StaticToken {
    async fn token(&self) -> BackendResult<String> {
        if self.0.trim().is_empty() {
            return Err(BackendError::auth("no token configured"));
        }
        Ok(self.0.clone())
    }
}
