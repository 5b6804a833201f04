use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::orders::{OrderId, Side};

/// A trade represents a matched transaction between two orders.
///
/// - `price` comes from the passive (resting) order — price improvement
///   accrues to the aggressor, never the other way around.
/// - `aggressor_side` is the side of the order that caused the match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub price: Decimal,
    pub quantity: Decimal,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub aggressor_side: Side,
    pub timestamp: i64,
}
