use rust_decimal::Decimal;

use crate::orders::{Order, OrderId, Side, TimeInForce};
use crate::snapshot::OrderBookSnapshot;

use super::{price_for_aggression, ExecutionState, ExecutionStrategy, StrategyAction};

#[derive(Debug, Clone)]
pub struct TwapConfig {
    pub target_quantity: Decimal,
    pub side: Side,
    pub num_slices: u32,
    pub duration_seconds: f64,
    /// `<=0.5` passive, `(0.5, 0.8]` mid-cross, `>0.8` market. See
    /// [`super::price_for_aggression`].
    pub aggression: f64,
}

/// Slices `target_quantity` into `num_slices` equal child orders, one per
/// `duration_seconds / num_slices` interval of simulated time.
pub struct Twap {
    cfg: TwapConfig,
    state: ExecutionState,
    slices_emitted: u32,
}

impl Twap {
    pub fn new(cfg: TwapConfig, first_child_id: OrderId) -> Self {
        let state = ExecutionState::new(cfg.side, cfg.target_quantity, first_child_id);
        Self { cfg, state, slices_emitted: 0 }
    }

    fn slice_quantity(&self) -> Decimal {
        self.cfg.target_quantity / Decimal::from(self.cfg.num_slices)
    }
}

impl ExecutionStrategy for Twap {
    fn on_tick(&mut self, snapshot: &OrderBookSnapshot, elapsed_seconds: f64, _market_volume_delta: Decimal) -> Vec<StrategyAction> {
        if self.state.is_complete() || self.slices_emitted >= self.cfg.num_slices {
            return Vec::new();
        }
        let slice_interval = self.cfg.duration_seconds / self.cfg.num_slices as f64;
        let due_slices = ((elapsed_seconds / slice_interval).floor() as i64 + 1).max(0) as u32;
        if due_slices <= self.slices_emitted {
            return Vec::new();
        }

        let Some((order_type, price, tif)) = price_for_aggression(self.cfg.side, self.cfg.aggression, snapshot) else {
            return Vec::new();
        };

        let is_last_slice = self.slices_emitted + 1 == self.cfg.num_slices;
        let quantity = if is_last_slice { self.state.remaining_quantity() } else { self.slice_quantity() };
        if quantity <= Decimal::ZERO {
            self.slices_emitted += 1;
            return Vec::new();
        }

        let child_id = self.state.next_child_id();
        self.state.track_child(child_id);
        self.slices_emitted += 1;
        let timestamp_ns = (elapsed_seconds * 1e9) as i64;
        let order = Order::new(child_id, self.cfg.side, order_type, price, quantity, tif, timestamp_ns, None);
        vec![StrategyAction::Submit(order)]
    }

    fn update_execution(&mut self, _child_order_id: OrderId, fill_price: Decimal, fill_quantity: Decimal) {
        self.state.record_fill(fill_price, fill_quantity);
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

    fn snapshot_with_liquidity() -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: 0,
            symbol: "TEST".into(),
            bids: vec![(dec!(99), dec!(500))],
            asks: vec![(dec!(101), dec!(500))],
            best_bid: Some(dec!(99)),
            best_ask: Some(dec!(101)),
            spread: Some(dec!(2)),
            mid_price: Some(dec!(100)),
            last_trade_price: None,
        }
    }

    #[test]
    fn emits_ten_slices_over_sixty_seconds() {
        let cfg = TwapConfig {
            target_quantity: dec!(1000),
            side: Side::Buy,
            num_slices: 10,
            duration_seconds: 60.0,
            aggression: 0.2,
        };
        let mut twap = Twap::new(cfg, 1);
        let snapshot = snapshot_with_liquidity();
        let mut emitted = 0;
        for tick in 0..60 {
            let actions = twap.on_tick(&snapshot, tick as f64, Decimal::ZERO);
            emitted += actions.len();
            for action in actions {
                if let StrategyAction::Submit(order) = action {
                    twap.update_execution(order.order_id, dec!(99), order.quantity);
                }
            }
        }
        assert_eq!(emitted, 10);
        assert_eq!(twap.executed_quantity(), dec!(1000));
        assert!(twap.is_complete());
    }
}
