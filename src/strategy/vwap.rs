use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::orders::{Order, OrderId, Side};
use crate::snapshot::OrderBookSnapshot;

use super::{price_for_aggression, ExecutionState, ExecutionStrategy, StrategyAction};

/// `(time_fraction, cumulative_volume_fraction)` points, sorted ascending
/// by `time_fraction`, both ends pinned to 0.0 and 1.0.
pub type VolumeProfile = Vec<(f64, f64)>;

/// A generic U-shape: heavier participation near the open and close, a
/// quiet middle session, matching the textbook intraday volume curve.
pub fn default_u_shape_profile() -> VolumeProfile {
    vec![
        (0.0, 0.0),
        (0.1, 0.15),
        (0.3, 0.35),
        (0.5, 0.45),
        (0.7, 0.55),
        (0.9, 0.75),
        (1.0, 1.0),
    ]
}

fn cumulative_fraction_at(profile: &VolumeProfile, t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if let Some(first) = profile.first() {
        if t <= first.0 {
            return first.1;
        }
    }
    if let Some(last) = profile.last() {
        if t >= last.0 {
            return last.1;
        }
    }
    for window in profile.windows(2) {
        let (t0, v0) = window[0];
        let (t1, v1) = window[1];
        if t >= t0 && t <= t1 {
            if (t1 - t0).abs() < f64::EPSILON {
                return v1;
            }
            let frac = (t - t0) / (t1 - t0);
            return v0 + frac * (v1 - v0);
        }
    }
    profile.last().map(|p| p.1).unwrap_or(1.0)
}

#[derive(Debug, Clone)]
pub struct VwapConfig {
    pub target_quantity: Decimal,
    pub side: Side,
    pub duration_seconds: f64,
    pub profile: VolumeProfile,
}

/// Targets a cumulative-quantity curve interpolated from a volume profile,
/// emitting one child per tick for the gap between target and executed.
pub struct Vwap {
    cfg: VwapConfig,
    state: ExecutionState,
}

impl Vwap {
    pub fn new(cfg: VwapConfig, first_child_id: OrderId) -> Self {
        let state = ExecutionState::new(cfg.side, cfg.target_quantity, first_child_id);
        Self { cfg, state }
    }
}

impl ExecutionStrategy for Vwap {
    fn on_tick(&mut self, snapshot: &OrderBookSnapshot, elapsed_seconds: f64, _market_volume_delta: Decimal) -> Vec<StrategyAction> {
        if self.state.is_complete() {
            return Vec::new();
        }
        let fraction = (elapsed_seconds / self.cfg.duration_seconds).clamp(0.0, 1.0);
        let cumulative_fraction = cumulative_fraction_at(&self.cfg.profile, fraction);
        let target_cumulative = self.cfg.target_quantity * Decimal::from_f64(cumulative_fraction).unwrap_or(Decimal::ZERO);
        let gap = (target_cumulative - self.state.executed_quantity()).max(Decimal::ZERO);
        let quantity = gap.min(self.state.remaining_quantity());
        if quantity <= Decimal::ZERO {
            return Vec::new();
        }

        // Spec: "pricing rule identical to TWAP's moderate-aggression
        // branch" — always mid-price limit for VWAP.
        let Some((order_type, price, tif)) = price_for_aggression(self.cfg.side, 0.6, snapshot) else {
            return Vec::new();
        };

        let child_id = self.state.next_child_id();
        self.state.track_child(child_id);
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

    #[test]
    fn interpolates_between_profile_points() {
        let profile = default_u_shape_profile();
        let at_start = cumulative_fraction_at(&profile, 0.0);
        let at_mid = cumulative_fraction_at(&profile, 0.5);
        let at_end = cumulative_fraction_at(&profile, 1.0);
        assert_eq!(at_start, 0.0);
        assert_eq!(at_mid, 0.45);
        assert_eq!(at_end, 1.0);

        let between = cumulative_fraction_at(&profile, 0.2);
        assert!(between > 0.15 && between < 0.35);
    }

    #[test]
    fn never_exceeds_target_quantity() {
        let cfg = VwapConfig {
            target_quantity: dec!(1000),
            side: Side::Buy,
            duration_seconds: 10.0,
            profile: default_u_shape_profile(),
        };
        let mut vwap = Vwap::new(cfg, 1);
        let snapshot = OrderBookSnapshot {
            timestamp: 0,
            symbol: "TEST".into(),
            bids: vec![],
            asks: vec![],
            best_bid: Some(dec!(99)),
            best_ask: Some(dec!(101)),
            spread: Some(dec!(2)),
            mid_price: Some(dec!(100)),
            last_trade_price: None,
        };
        let mut total_submitted = Decimal::ZERO;
        for tick in 0..=10 {
            let actions = vwap.on_tick(&snapshot, tick as f64, Decimal::ZERO);
            for action in actions {
                if let StrategyAction::Submit(order) = action {
                    total_submitted += order.quantity;
                    vwap.update_execution(order.order_id, dec!(100), order.quantity);
                }
            }
        }
        assert!(total_submitted <= dec!(1000));
        assert_eq!(vwap.executed_quantity(), total_submitted);
    }
}
