//! Core types for the prediction market sync engine
//!
//! This crate defines the shared data structures used by every producer and
//! consumer of market state: the market record and its partial patch form,
//! on-chain event projections, positions, and the wire parsing that turns
//! loosely-typed backend JSON into those types.

pub mod chain;
pub mod error;
pub mod market;
pub mod position;
pub mod wire;

pub use chain::ChainEvent;
pub use error::{MarketError, MarketResult};
pub use market::{
    KeySource, MarketKey, MarketPatch, MarketRecord, MarketState, MarketType, WinningDirection,
};
pub use position::{Direction, PositionRecord};
pub use wire::{parse_market_list, parse_market_values, MarketBatch, RawMarket};
