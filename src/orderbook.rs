//! The limit order book: owns both sides, the order-id index, last-trade
//! state, and aggregate counters, and is the sole authority on matching.
//!
//! Bids and asks are each a [`BTreeMap`] keyed by price → [`PriceLevel`].
//! Per the design note in the spec, this single ordered map replaces the
//! source's dual heap-of-prices + hash-of-price→level index: the map gives
//! both O(log n) top-of-book lookup and in-order iteration without the two
//! structures ever being able to drift apart.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::orders::{Order, OrderId, OrderStatus, OrderType, Side, TimeInForce};
use crate::price_level::PriceLevel;
use crate::snapshot::OrderBookSnapshot;
use crate::trade::Trade;

/// Default depth for [`LimitOrderBook::get_snapshot`] when the caller has
/// no specific depth requirement.
pub const DEFAULT_SNAPSHOT_LEVELS: usize = 10;

/// Running totals exposed as read-only book properties.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookCounters {
    pub total_orders_received: u64,
    pub total_trades: u64,
    pub total_volume: Decimal,
}

/// Result of [`LimitOrderBook::add_order`]: the trades generated, plus the
/// submitted order with its final status and fill state.
///
/// The spec's literal contract is `add_order(order) -> list<Trade>`; in
/// Rust, returning the (possibly-mutated, possibly-rejected) order
/// alongside its trades is the idiomatic way to let the caller observe the
/// "order's final status is set" half of that contract without reaching
/// for interior mutability.
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order: Order,
    pub trades: Vec<Trade>,
}

pub struct LimitOrderBook {
    pub symbol: String,
    bids: BTreeMap<Decimal, PriceLevel>,
    asks: BTreeMap<Decimal, PriceLevel>,
    /// order_id -> (side, price) so cancel_order doesn't have to scan both
    /// sides blindly.
    index: HashMap<OrderId, (Side, Decimal)>,
    last_trade_price: Option<Decimal>,
    next_trade_id: u64,
    counters: BookCounters,
}

fn crosses(side: Side, limit: Option<Decimal>, level_price: Decimal) -> bool {
    match limit {
        None => true,
        Some(limit_price) => match side {
            Side::Buy => level_price <= limit_price,
            Side::Sell => level_price >= limit_price,
        },
    }
}

impl LimitOrderBook {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            last_trade_price: None,
            next_trade_id: 1,
            counters: BookCounters::default(),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        Some((self.best_bid()? + self.best_ask()?) / Decimal::TWO)
    }

    pub fn last_trade_price(&self) -> Option<Decimal> {
        self.last_trade_price
    }

    pub fn counters(&self) -> BookCounters {
        self.counters
    }

    /// Returns the opposite-side book map an order of `side` would match
    /// against: buys match asks, sells match bids.
    fn opposite_map(&self, side: Side) -> &BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    fn opposite_map_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &mut self.asks,
            Side::Sell => &mut self.bids,
        }
    }

    fn own_map_mut(&mut self, side: Side) -> &mut BTreeMap<Decimal, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Sums up fillable quantity on the opposite side, in priority order,
    /// without mutating anything. Used to pre-check FOK feasibility so a
    /// rejected FOK order leaves byte-for-byte identical state.
    fn simulate_fillable(&self, side: Side, limit: Option<Decimal>) -> Decimal {
        let map = self.opposite_map(side);
        let mut total = Decimal::ZERO;
        let levels: Box<dyn Iterator<Item = &PriceLevel>> = match side {
            Side::Buy => Box::new(map.values()),
            Side::Sell => Box::new(map.values().rev()),
        };
        for level in levels {
            if !crosses(side, limit, level.price) {
                break;
            }
            total += level.total_quantity();
        }
        total
    }

    /// Walks the opposite side in price-time priority, filling `incoming`
    /// as far as its remaining quantity and (for limit orders) its limit
    /// price allow. Mutates both sides' state and returns the trades
    /// generated, in match order (best price first, then FIFO within a
    /// level).
    fn match_incoming(&mut self, incoming: &mut Order) -> Vec<Trade> {
        let mut trades = Vec::new();
        let side = incoming.side;
        loop {
            if incoming.remaining_quantity() <= Decimal::ZERO {
                break;
            }
            let map = self.opposite_map_mut(side);
            let best_price = match side {
                Side::Buy => map.keys().next().copied(),
                Side::Sell => map.keys().next_back().copied(),
            };
            let Some(price) = best_price else { break };
            if !crosses(side, incoming.price, price) {
                break;
            }

            let level = map.get_mut(&price).expect("best price key must be present");
            let (passive_id, fill, passive_remaining_after) = {
                let passive = level.front_mut().expect("non-empty level has a front order");
                let fill = incoming.remaining_quantity().min(passive.remaining_quantity());
                incoming.apply_fill(fill);
                passive.apply_fill(fill);
                (passive.order_id, fill, passive.remaining_quantity())
            };
            level.fill_front(fill);

            let (buy_order_id, sell_order_id) = match side {
                Side::Buy => (incoming.order_id, passive_id),
                Side::Sell => (passive_id, incoming.order_id),
            };
            trades.push(Trade {
                trade_id: self.next_trade_id,
                price,
                quantity: fill,
                buy_order_id,
                sell_order_id,
                aggressor_side: side,
                timestamp: incoming.timestamp,
            });
            self.next_trade_id += 1;
            self.counters.total_trades += 1;
            self.counters.total_volume += fill;
            self.last_trade_price = Some(price);

            if passive_remaining_after == Decimal::ZERO {
                let done = level.pop_front().expect("front order still present after fill");
                self.index.remove(&done.order_id);
            }
            if level.is_empty() {
                map.remove(&price);
            }
        }
        trades
    }

    /// Rests a resting-eligible order at its limit price, updating the
    /// order index.
    fn rest(&mut self, order: Order) {
        let price = order.price.expect("resting order always carries a limit price");
        let order_id = order.order_id;
        let side = order.side;
        self.own_map_mut(side)
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(order);
        self.index.insert(order_id, (side, price));
    }

    /// Accepts a `NEW` order, matches it against the book, rests any
    /// GTC remainder, and reports the outcome.
    ///
    /// See spec §4.1 for the full contract; summarized: duplicate ids,
    /// non-positive quantity, and a missing price on a LIMIT order are all
    /// rejected with no trades and no state change. A MARKET order against
    /// an empty opposite side is cancelled, not rejected, and produces no
    /// trade. FOK is checked for full feasibility before any mutation.
    pub fn add_order(&mut self, mut order: Order) -> OrderAck {
        self.counters.total_orders_received += 1;

        if order.quantity <= Decimal::ZERO || self.index.contains_key(&order.order_id) {
            warn!(order_id = order.order_id, "order rejected: duplicate id or non-positive quantity");
            order.status = OrderStatus::Rejected;
            return OrderAck { order, trades: Vec::new() };
        }
        if matches!(order.order_type, OrderType::Limit) && order.price.is_none() {
            warn!(order_id = order.order_id, "order rejected: limit order missing price");
            order.status = OrderStatus::Rejected;
            return OrderAck { order, trades: Vec::new() };
        }
        if matches!(order.order_type, OrderType::Market) && self.opposite_map(order.side).is_empty() {
            info!(order_id = order.order_id, "market order cancelled: opposite side empty");
            order.status = OrderStatus::Cancelled;
            return OrderAck { order, trades: Vec::new() };
        }
        if matches!(order.time_in_force, TimeInForce::Fok) {
            let fillable = self.simulate_fillable(order.side, order.price);
            if fillable < order.remaining_quantity() {
                info!(order_id = order.order_id, "FOK order rejected: insufficient liquidity");
                order.status = OrderStatus::Rejected;
                return OrderAck { order, trades: Vec::new() };
            }
        }

        info!(order_id = order.order_id, side = ?order.side, "matching incoming order");
        let trades = self.match_incoming(&mut order);

        order.status = match (order.order_type, order.time_in_force, order.remaining_quantity() > Decimal::ZERO) {
            (_, _, false) => OrderStatus::Filled,
            (OrderType::Market, _, true) => OrderStatus::Cancelled,
            (OrderType::Limit, TimeInForce::Gtc, true) => {
                let partial = order.filled_quantity > Decimal::ZERO;
                self.rest(order.clone());
                if partial {
                    OrderStatus::Partial
                } else {
                    OrderStatus::New
                }
            }
            (OrderType::Limit, TimeInForce::Ioc, true) => OrderStatus::Cancelled,
            (OrderType::Limit, TimeInForce::Fok, true) => {
                unreachable!("FOK pre-check guarantees full fill")
            }
        };

        OrderAck { order, trades }
    }

    /// Removes an order from its level and the index. Idempotent: returns
    /// `false` (no-op) if the id is unknown or already terminal.
    pub fn cancel_order(&mut self, order_id: OrderId) -> bool {
        let Some((side, price)) = self.index.remove(&order_id) else {
            return false;
        };
        let map = self.own_map_mut(side);
        let Some(level) = map.get_mut(&price) else {
            return false;
        };
        let removed = level.remove_by_id(order_id).is_some();
        if level.is_empty() {
            map.remove(&price);
        }
        removed
    }

    /// Returns the top `levels` aggregated price levels per side, plus
    /// cached top-of-book stats, stamped with `timestamp_ns`.
    ///
    /// The book itself tracks no wall clock (it is driven purely by
    /// caller-supplied timestamps, keeping it deterministic and
    /// replay-friendly); the replay driver and backtester are the ones
    /// that know "now" in simulated time.
    pub fn get_snapshot(&self, timestamp_ns: i64, levels: usize) -> OrderBookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(levels)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(levels)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect();
        OrderBookSnapshot {
            timestamp: timestamp_ns,
            symbol: self.symbol.clone(),
            bids,
            asks,
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            spread: self.spread(),
            mid_price: self.mid_price(),
            last_trade_price: self.last_trade_price,
        }
    }

    /// Returns an error if any resting order's remaining quantity doesn't
    /// reconcile with its level's cached `total_quantity`, or if the book
    /// is crossed. Exposed for invariant-checking tests and debug
    /// assertions; not on the matching hot path.
    pub fn check_invariants(&self) -> Result<(), crate::errors::EngineError> {
        for (side_name, map) in [("bids", &self.bids), ("asks", &self.asks)] {
            for (price, level) in map.iter() {
                if level.is_empty() {
                    return Err(crate::errors::EngineError::InvariantViolation(format!(
                        "{side_name} level at {price} is empty but still present"
                    )));
                }
                let sum: Decimal = level.iter().map(|o| o.remaining_quantity()).sum();
                if sum != level.total_quantity() {
                    return Err(crate::errors::EngineError::InvariantViolation(format!(
                        "{side_name} level at {price} total_quantity {} != sum {sum}",
                        level.total_quantity()
                    )));
                }
            }
        }
        if let (Some(bb), Some(ba)) = (self.best_bid(), self.best_ask()) {
            if bb >= ba {
                return Err(crate::errors::EngineError::InvariantViolation(format!(
                    "book crossed: best_bid {bb} >= best_ask {ba}"
                )));
            }
        }
        Ok(())
    }
}
