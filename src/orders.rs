//! Order value types: sides, order types, time-in-force, and the resting
//! [`Order`] record itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monotonic, cheap-to-compare order identity.
///
/// A plain integer counter is preferred over a string id since it avoids
/// string hashing on the matching hot path.
pub type OrderId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side that rests opposite an order of `self` (bids match asks and
    /// vice versa).
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force: how long an order is allowed to chase a fill before it
/// stops trying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-till-cancelled: rests until matched or explicitly cancelled.
    Gtc,
    /// Immediate-or-cancel: match what you can right now, cancel the rest.
    Ioc,
    /// Fill-or-kill: match in full immediately, or reject atomically.
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    Partial,
    Filled,
    Cancelled,
    Rejected,
}

/// An order as it travels through the book.
///
/// `filled_quantity` only ever grows; `status` is recomputed by the book
/// after every mutation, never set directly by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price. Ignored (and may be `None`) for `OrderType::Market`.
    pub price: Option<Decimal>,
    pub quantity: Decimal,
    pub filled_quantity: Decimal,
    pub status: OrderStatus,
    pub time_in_force: TimeInForce,
    /// Nanoseconds since epoch, assigned by the submitter.
    pub timestamp: i64,
    pub owner_id: Option<String>,
}

impl Order {
    /// Builds a fresh `NEW` order with zero fills.
    pub fn new(
        order_id: OrderId,
        side: Side,
        order_type: OrderType,
        price: Option<Decimal>,
        quantity: Decimal,
        time_in_force: TimeInForce,
        timestamp: i64,
        owner_id: Option<String>,
    ) -> Self {
        Self {
            order_id,
            side,
            order_type,
            price,
            quantity,
            filled_quantity: Decimal::ZERO,
            status: OrderStatus::New,
            time_in_force,
            timestamp,
            owner_id,
        }
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    pub fn is_resting_eligible(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
            && matches!(self.time_in_force, TimeInForce::Gtc)
    }

    /// Applies a fill of `qty` and advances `status` accordingly. Does not
    /// touch anything else about the order (the level/index bookkeeping is
    /// the book's job).
    pub fn apply_fill(&mut self, qty: Decimal) {
        self.filled_quantity += qty;
        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else if self.filled_quantity > Decimal::ZERO {
            OrderStatus::Partial
        } else {
            self.status
        };
    }
}
