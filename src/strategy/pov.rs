use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::orders::{Order, OrderId, OrderType, Side, TimeInForce};
use crate::snapshot::OrderBookSnapshot;

use super::{ExecutionState, ExecutionStrategy, StrategyAction};

#[derive(Debug, Clone)]
pub struct PovConfig {
    pub target_quantity: Decimal,
    pub side: Side,
    /// Fraction of observed market volume to participate in, e.g. `0.1`
    /// for 10% of volume.
    pub participation_rate: f64,
}

/// Tracks market volume via the harness-supplied `market_volume_delta` and
/// chases a fixed participation rate of it, with no fixed cadence.
pub struct Pov {
    cfg: PovConfig,
    state: ExecutionState,
}

impl Pov {
    pub fn new(cfg: PovConfig, first_child_id: OrderId) -> Self {
        let state = ExecutionState::new(cfg.side, cfg.target_quantity, first_child_id);
        Self { cfg, state }
    }
}

impl ExecutionStrategy for Pov {
    fn on_tick(&mut self, _snapshot: &OrderBookSnapshot, elapsed_seconds: f64, market_volume_delta: Decimal) -> Vec<StrategyAction> {
        if self.state.is_complete() || market_volume_delta <= Decimal::ZERO {
            return Vec::new();
        }
        let rate = Decimal::from_f64(self.cfg.participation_rate).unwrap_or(Decimal::ZERO);
        let quantity = (market_volume_delta * rate).min(self.state.remaining_quantity());
        if quantity <= Decimal::ZERO {
            return Vec::new();
        }

        let child_id = self.state.next_child_id();
        self.state.track_child(child_id);
        let timestamp_ns = (elapsed_seconds * 1e9) as i64;
        let order = Order::new(child_id, self.cfg.side, OrderType::Market, None, quantity, TimeInForce::Ioc, timestamp_ns, None);
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

    fn snapshot() -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: 0,
            symbol: "TEST".into(),
            bids: vec![],
            asks: vec![],
            best_bid: Some(dec!(99)),
            best_ask: Some(dec!(101)),
            spread: Some(dec!(2)),
            mid_price: Some(dec!(100)),
            last_trade_price: None,
        }
    }

    #[test]
    fn participates_at_configured_rate() {
        let cfg = PovConfig { target_quantity: dec!(1000), side: Side::Buy, participation_rate: 0.1 };
        let mut pov = Pov::new(cfg, 1);
        let actions = pov.on_tick(&snapshot(), 1.0, dec!(500));
        assert_eq!(actions.len(), 1);
        let StrategyAction::Submit(order) = &actions[0] else { panic!("expected submit") };
        assert_eq!(order.quantity, dec!(50));
    }

    #[test]
    fn no_action_without_volume() {
        let cfg = PovConfig { target_quantity: dec!(1000), side: Side::Buy, participation_rate: 0.1 };
        let mut pov = Pov::new(cfg, 1);
        let actions = pov.on_tick(&snapshot(), 1.0, Decimal::ZERO);
        assert!(actions.is_empty());
    }

    #[test]
    fn caps_at_remaining_quantity() {
        let cfg = PovConfig { target_quantity: dec!(10), side: Side::Buy, participation_rate: 1.0 };
        let mut pov = Pov::new(cfg, 1);
        let actions = pov.on_tick(&snapshot(), 1.0, dec!(500));
        let StrategyAction::Submit(order) = &actions[0] else { panic!("expected submit") };
        assert_eq!(order.quantity, dec!(10));
    }
}
