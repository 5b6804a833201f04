use rust_decimal::Decimal;

use crate::orders::{Order, OrderId, OrderType, Side, TimeInForce};
use crate::snapshot::OrderBookSnapshot;

use super::{ExecutionState, ExecutionStrategy, StrategyAction};

#[derive(Debug, Clone)]
pub struct PostingConfig {
    pub target_quantity: Decimal,
    pub side: Side,
    /// `0.0` joins the best, `1.0` crosses to the opposite touch.
    pub fraction: Decimal,
    /// Re-quote once the mid has drifted by more than this absolute
    /// amount since the resting child was last (re)priced.
    pub reprice_threshold: Decimal,
}

/// Maintains at most one resting child order, re-quoting it whenever the
/// mid drifts or the intended price has moved out from under it.
///
/// Direct generalization of the teacher's `market_maker.rs` quoting loop:
/// same "price off best +/- a fraction of spread, cancel-and-replace on
/// staleness" shape, generalized from a perpetual two-sided quote to a
/// single-sided child chasing a finite target.
pub struct Posting {
    cfg: PostingConfig,
    state: ExecutionState,
    resting_child: Option<OrderId>,
    last_quoted_price: Option<Decimal>,
    last_mid: Option<Decimal>,
}

impl Posting {
    pub fn new(cfg: PostingConfig, first_child_id: OrderId) -> Self {
        let state = ExecutionState::new(cfg.side, cfg.target_quantity, first_child_id);
        Self { cfg, state, resting_child: None, last_quoted_price: None, last_mid: None }
    }

    fn desired_price(&self, snapshot: &OrderBookSnapshot) -> Option<Decimal> {
        match self.cfg.side {
            Side::Buy => {
                let best_bid = snapshot.best_bid?;
                let spread = snapshot.spread?;
                Some(best_bid + self.cfg.fraction * spread)
            }
            Side::Sell => {
                let best_ask = snapshot.best_ask?;
                let spread = snapshot.spread?;
                Some(best_ask - self.cfg.fraction * spread)
            }
        }
    }

    fn mid_has_drifted(&self, mid: Option<Decimal>) -> bool {
        match (self.last_mid, mid) {
            (Some(last), Some(now)) => (now - last).abs() > self.cfg.reprice_threshold,
            _ => false,
        }
    }
}

impl ExecutionStrategy for Posting {
    fn on_tick(&mut self, snapshot: &OrderBookSnapshot, elapsed_seconds: f64, _market_volume_delta: Decimal) -> Vec<StrategyAction> {
        if self.state.is_complete() {
            return Vec::new();
        }
        let Some(desired) = self.desired_price(snapshot) else {
            return Vec::new();
        };

        let stale = match (self.resting_child, self.last_quoted_price) {
            (Some(_), Some(quoted)) => quoted != desired || self.mid_has_drifted(snapshot.mid_price),
            (None, _) => true,
            _ => true,
        };
        if !stale {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if let Some(child_id) = self.resting_child.take() {
            actions.push(StrategyAction::Cancel(child_id));
            self.state.untrack_child(child_id);
        }

        let child_id = self.state.next_child_id();
        self.state.track_child(child_id);
        self.resting_child = Some(child_id);
        self.last_quoted_price = Some(desired);
        self.last_mid = snapshot.mid_price;

        let timestamp_ns = (elapsed_seconds * 1e9) as i64;
        let order = Order::new(
            child_id,
            self.cfg.side,
            OrderType::Limit,
            Some(desired),
            self.state.remaining_quantity(),
            TimeInForce::Gtc,
            timestamp_ns,
            None,
        );
        actions.push(StrategyAction::Submit(order));
        actions
    }

    fn update_execution(&mut self, child_order_id: OrderId, fill_price: Decimal, fill_quantity: Decimal) {
        self.state.record_fill(fill_price, fill_quantity);
        if self.state.is_complete() && self.resting_child == Some(child_order_id) {
            self.resting_child = None;
        }
    }

    fn remaining_quantity(&self) -> Decimal {
        self.state.remaining_quantity()
    }

    fn executed_quantity(&self) -> Decimal {
        self.state.executed_quantity()
    }

    fn average_price(&self) -> Option<Decimal> {
        self.state.average_price()
    }

    fn is_complete(&self) -> bool {
        self.state.is_complete()
    }

    fn side(&self) -> Side {
        self.cfg.side
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(best_bid: Decimal, best_ask: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: 0,
            symbol: "TEST".into(),
            bids: vec![(best_bid, dec!(100))],
            asks: vec![(best_ask, dec!(100))],
            best_bid: Some(best_bid),
            best_ask: Some(best_ask),
            spread: Some(best_ask - best_bid),
            mid_price: Some((best_bid + best_ask) / dec!(2)),
            last_trade_price: None,
        }
    }

    #[test]
    fn posts_once_then_stays_quiet_while_fresh() {
        let cfg = PostingConfig { target_quantity: dec!(100), side: Side::Buy, fraction: dec!(0), reprice_threshold: dec!(1) };
        let mut posting = Posting::new(cfg, 1);
        let snap = snapshot(dec!(99), dec!(101));

        let first = posting.on_tick(&snap, 0.0, Decimal::ZERO);
        assert_eq!(first.len(), 1);

        let second = posting.on_tick(&snap, 1.0, Decimal::ZERO);
        assert!(second.is_empty());
    }

    #[test]
    fn requotes_on_mid_drift() {
        let cfg = PostingConfig { target_quantity: dec!(100), side: Side::Buy, fraction: dec!(0), reprice_threshold: dec!(1) };
        let mut posting = Posting::new(cfg, 1);
        posting.on_tick(&snapshot(dec!(99), dec!(101)), 0.0, Decimal::ZERO);

        let drifted = posting.on_tick(&snapshot(dec!(105), dec!(107)), 1.0, Decimal::ZERO);
        assert_eq!(drifted.len(), 2);
        assert!(matches!(drifted[0], StrategyAction::Cancel(_)));
        assert!(matches!(drifted[1], StrategyAction::Submit(_)));
    }
}
