//! Point-in-time projections of a [`crate::orderbook::LimitOrderBook`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Top-N aggregated levels per side plus cached top-of-book statistics.
///
/// Matches the wire shape in spec §6: prices/quantities are `Decimal`
/// (serialized as strings via `rust_decimal`'s serde support), never
/// floats, and optional fields are `null` (`None`) when undefined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub timestamp: i64,
    pub symbol: String,
    /// Highest price first.
    pub bids: Vec<(Decimal, Decimal)>,
    /// Lowest price first.
    pub asks: Vec<(Decimal, Decimal)>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub last_trade_price: Option<Decimal>,
}

impl OrderBookSnapshot {
    pub fn empty(symbol: impl Into<String>, timestamp: i64) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            best_bid: None,
            best_ask: None,
            spread: None,
            mid_price: None,
            last_trade_price: None,
        }
    }
}
