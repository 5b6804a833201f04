//! Runs a background event stream and an [`ExecutionStrategy`] against the
//! same book, attributing fills back to the strategy and accumulating
//! market metrics as it goes.
//!
//! Follows the same run-loop shape as [`crate::replay::ReplayEngine`]
//! (advance time, apply events, periodically observe state), generalized
//! to also query a strategy at each observation point and feed its child
//! orders back into the same book.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::info;

use crate::generator::GeneratorEvent;
use crate::metrics::{self, MetricsResult};
use crate::orderbook::LimitOrderBook;
use crate::replay::ReplayConfig;
use crate::snapshot::OrderBookSnapshot;
use crate::strategy::{ExecutionStrategy, StrategyAction};
use crate::trade::Trade;

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResults {
    pub target_quantity: Decimal,
    pub executed_quantity: Decimal,
    pub fill_rate: f64,
    pub strategy_vwap: Option<Decimal>,
    pub arrival_price: Option<Decimal>,
    /// Signed in the strategy's unfavourable direction: positive means the
    /// strategy paid (or received) worse than the arrival mid.
    pub slippage: Option<Decimal>,
    pub slippage_bps: Option<f64>,
    pub child_order_count: usize,
    pub fill_count: usize,
    pub market_metrics: MetricsResult,
}

pub struct Backtester {
    book: LimitOrderBook,
    replay_config: ReplayConfig,
    annualization_factor: Option<f64>,
}

impl Backtester {
    pub fn new(book: LimitOrderBook, replay_config: ReplayConfig, annualization_factor: Option<f64>) -> Self {
        Self { book, replay_config, annualization_factor }
    }

    pub fn book(&self) -> &LimitOrderBook {
        &self.book
    }

    /// Drives `background_events` (typically a [`crate::generator::PoissonOrderGenerator`])
    /// against the book, querying `strategy` at every snapshot interval and
    /// submitting its orders through the same book. Stops early once the
    /// strategy reports `is_complete`.
    pub async fn run<I>(&mut self, background_events: I, strategy: &mut dyn ExecutionStrategy) -> BacktestResults
    where
        I: IntoIterator<Item = (f64, GeneratorEvent)>,
    {
        let target_quantity = strategy.remaining_quantity();
        let start = Instant::now();
        let mut last_snapshot_at = 0.0_f64;
        let mut snapshots_history: Vec<OrderBookSnapshot> = Vec::new();
        let mut trades_history: Vec<Trade> = Vec::new();
        let mut volume_since_tick = Decimal::ZERO;
        let mut arrival_price: Option<Decimal> = None;
        let mut fill_count = 0usize;
        let mut child_order_count = 0usize;

        for (elapsed, event) in background_events {
            if self.replay_config.speed_multiplier > 0.0 {
                let target = Duration::from_secs_f64(elapsed / self.replay_config.speed_multiplier);
                let now = start.elapsed();
                if target > now {
                    tokio::time::sleep(target - now).await;
                }
            }

            match event {
                GeneratorEvent::New(order) => {
                    let ack = self.book.add_order(order);
                    for trade in &ack.trades {
                        volume_since_tick += trade.quantity;
                        trades_history.push(trade.clone());
                    }
                }
                GeneratorEvent::Cancel(order_id) => {
                    self.book.cancel_order(order_id);
                }
            }

            let due_for_snapshot = snapshots_history.is_empty() || elapsed - last_snapshot_at >= self.replay_config.snapshot_interval_seconds;
            if !due_for_snapshot {
                continue;
            }
            last_snapshot_at = elapsed;
            let snapshot = self.book.get_snapshot((elapsed * 1e9) as i64, self.replay_config.snapshot_levels);
            if arrival_price.is_none() {
                arrival_price = snapshot.mid_price;
            }

            let actions = strategy.on_tick(&snapshot, elapsed, volume_since_tick);
            volume_since_tick = Decimal::ZERO;
            for action in actions {
                match action {
                    StrategyAction::Submit(order) => {
                        child_order_count += 1;
                        let child_id = order.order_id;
                        let ack = self.book.add_order(order);
                        for trade in &ack.trades {
                            trades_history.push(trade.clone());
                            if trade.buy_order_id == child_id || trade.sell_order_id == child_id {
                                fill_count += 1;
                                strategy.update_execution(child_id, trade.price, trade.quantity);
                            }
                        }
                    }
                    StrategyAction::Cancel(order_id) => {
                        self.book.cancel_order(order_id);
                    }
                }
            }

            snapshots_history.push(snapshot);
            if strategy.is_complete() {
                info!("backtest strategy reported completion, stopping early");
                break;
            }
        }

        let market_metrics = metrics::compute(&snapshots_history, &trades_history, self.annualization_factor);
        let executed_quantity = strategy.executed_quantity();
        let fill_rate = if target_quantity > Decimal::ZERO {
            (executed_quantity / target_quantity).to_f64().unwrap_or(0.0)
        } else {
            0.0
        };
        let strategy_vwap = strategy.average_price();
        let slippage = match (strategy_vwap, arrival_price) {
            (Some(vwap), Some(arrival)) => Some(match strategy.side() {
                crate::orders::Side::Buy => vwap - arrival,
                crate::orders::Side::Sell => arrival - vwap,
            }),
            _ => None,
        };
        let slippage_bps = match (slippage, arrival_price) {
            (Some(slip), Some(arrival)) if arrival != Decimal::ZERO => (slip / arrival * Decimal::from(10_000)).to_f64(),
            _ => None,
        };

        BacktestResults {
            target_quantity,
            executed_quantity,
            fill_rate,
            strategy_vwap,
            arrival_price,
            slippage,
            slippage_bps,
            child_order_count,
            fill_count,
            market_metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::Side;
    use crate::strategy::{Twap, TwapConfig};
    use rust_decimal_macros::dec;

    /// A seeded source of resting sell liquidity, always ready to absorb a
    /// TWAP buy slice, modeling an opposite side with deep, static depth.
    struct StaticLiquiditySource {
        next_id: u64,
        remaining_ticks: u32,
    }

    impl Iterator for StaticLiquiditySource {
        type Item = (f64, GeneratorEvent);

        fn next(&mut self) -> Option<Self::Item> {
            if self.remaining_ticks == 0 {
                return None;
            }
            self.remaining_ticks -= 1;
            let tick = 60 - self.remaining_ticks;
            let id = self.next_id;
            self.next_id += 1;
            use crate::orders::{Order, OrderType, TimeInForce};
            let order = Order::new(id, Side::Sell, OrderType::Limit, Some(dec!(100)), dec!(200), TimeInForce::Gtc, tick as i64, None);
            Some((tick as f64, GeneratorEvent::New(order)))
        }
    }

    #[tokio::test]
    async fn twap_backtest_executes_full_target() {
        let book = LimitOrderBook::new("TEST");
        let replay_config = ReplayConfig { speed_multiplier: 0.0, snapshot_interval_seconds: 6.0, snapshot_levels: 5 };
        let mut backtester = Backtester::new(book, replay_config, None);

        let twap_cfg = TwapConfig { target_quantity: dec!(1000), side: Side::Buy, num_slices: 10, duration_seconds: 60.0, aggression: 0.9 };
        let mut strategy = Twap::new(twap_cfg, 1_000_000);

        let source = StaticLiquiditySource { next_id: 1, remaining_ticks: 60 };
        let results = backtester.run(source, &mut strategy).await;

        assert_eq!(results.target_quantity, dec!(1000));
        assert_eq!(results.executed_quantity, dec!(1000));
        assert!((results.fill_rate - 1.0).abs() < 1e-9);
        assert_eq!(results.child_order_count, 10);
        assert!(results.fill_count >= 10);
    }
}
