//! Backend endpoint and event vocabulary

use std::fmt;

use crate::auth::WalletAddress;

/// Default lookback window for resolved markets
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

/// Header carrying the wallet public key on REST calls
pub const WALLET_HEADER: &str = "wallet-address";

/// One of the three REST snapshot segments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Active,
    Observing,
    /// Bounded by the `lastHours` query parameter
    Resolved,
}

impl Segment {
    /// Segments in the order they are fetched
    pub const ALL: [Segment; 3] = [Segment::Active, Segment::Observing, Segment::Resolved];

    pub fn path(&self) -> &'static str {
        match self {
            Segment::Active => "/markets/active",
            Segment::Observing => "/markets/observing",
            Segment::Resolved => "/markets/resolved",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Segment::Active => "active",
            Segment::Observing => "observing",
            Segment::Resolved => "resolved",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named events on the market stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEventKind {
    Active,
    Observing,
    Resolved,
    /// One page of the resolved backlog
    ResolvedPage,
    /// Server is done; the client should close
    End,
}

impl StreamEventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "active" => Some(StreamEventKind::Active),
            "observing" => Some(StreamEventKind::Observing),
            "resolved" => Some(StreamEventKind::Resolved),
            "resolvedPage" => Some(StreamEventKind::ResolvedPage),
            "end" => Some(StreamEventKind::End),
            _ => None,
        }
    }

    /// Whether the event carries a market list
    pub fn carries_markets(&self) -> bool {
        !matches!(self, StreamEventKind::End)
    }
}

/// Everything needed to open the market stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub last_hours: u32,
    pub token: String,
    pub wallet: WalletAddress,
}
