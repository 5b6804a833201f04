//! Pure reducers over snapshot/trade history: no book access, no mutable
//! state, just folds over slices. Kept separate from [`crate::backtester`]
//! so the same reducers can be reused against any recorded run, live or
//! replayed.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Serialize;

use crate::orders::Side;
use crate::snapshot::OrderBookSnapshot;
use crate::trade::Trade;

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsResult {
    pub spread_mean: Option<Decimal>,
    pub spread_median: Option<Decimal>,
    pub spread_stddev: Option<f64>,
    pub mean_bid_depth: Decimal,
    pub mean_ask_depth: Decimal,
    pub mean_depth_imbalance: Option<f64>,
    pub order_flow_imbalance: Option<f64>,
    pub vwap: Option<Decimal>,
    pub total_volume: Decimal,
    pub trade_count: usize,
    /// Standard deviation of log-returns of `mid_price`, optionally scaled
    /// by an annualisation factor supplied by the caller (e.g.
    /// `sqrt(trading_periods_per_year)`).
    pub realized_volatility: Option<f64>,
}

fn decimal_mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum: Decimal = values.iter().sum();
    Some(sum / Decimal::from(values.len() as u64))
}

fn decimal_median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / Decimal::TWO)
    } else {
        Some(sorted[mid])
    }
}

fn f64_stddev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Computes the full metrics record over a recorded run.
///
/// `annualization_factor`, when given, multiplies the raw per-snapshot
/// log-return standard deviation to produce an annualised realized
/// volatility (e.g. `sqrt(periods_per_year)` for periodic snapshots).
pub fn compute(snapshots: &[OrderBookSnapshot], trades: &[Trade], annualization_factor: Option<f64>) -> MetricsResult {
    let spreads: Vec<Decimal> = snapshots.iter().filter_map(|s| s.spread).collect();
    let spread_mean = decimal_mean(&spreads);
    let spread_median = decimal_median(&spreads);
    let spread_stddev = f64_stddev(
        &spreads.iter().filter_map(|d| d.to_f64()).collect::<Vec<_>>(),
    );

    let bid_depths: Vec<Decimal> = snapshots.iter().map(|s| s.bids.iter().map(|(_, q)| *q).sum()).collect();
    let ask_depths: Vec<Decimal> = snapshots.iter().map(|s| s.asks.iter().map(|(_, q)| *q).sum()).collect();
    let mean_bid_depth = decimal_mean(&bid_depths).unwrap_or(Decimal::ZERO);
    let mean_ask_depth = decimal_mean(&ask_depths).unwrap_or(Decimal::ZERO);

    let imbalances: Vec<f64> = bid_depths
        .iter()
        .zip(ask_depths.iter())
        .filter_map(|(b, a)| {
            let total = b + a;
            if total == Decimal::ZERO {
                None
            } else {
                ((b - a) / total).to_f64()
            }
        })
        .collect();
    let mean_depth_imbalance = if imbalances.is_empty() {
        None
    } else {
        Some(imbalances.iter().sum::<f64>() / imbalances.len() as f64)
    };

    let (buy_vol, sell_vol) = trades.iter().fold((Decimal::ZERO, Decimal::ZERO), |(buy, sell), t| match t.aggressor_side {
        Side::Buy => (buy + t.quantity, sell),
        Side::Sell => (buy, sell + t.quantity),
    });
    let order_flow_imbalance = {
        let total = buy_vol + sell_vol;
        if total == Decimal::ZERO {
            None
        } else {
            ((buy_vol - sell_vol) / total).to_f64()
        }
    };

    let total_volume: Decimal = trades.iter().map(|t| t.quantity).sum();
    let notional: Decimal = trades.iter().map(|t| t.price * t.quantity).sum();
    let vwap = if total_volume > Decimal::ZERO { Some(notional / total_volume) } else { None };

    let mids: Vec<f64> = snapshots.iter().filter_map(|s| s.mid_price).filter_map(|d| d.to_f64()).collect();
    let log_returns: Vec<f64> = mids
        .windows(2)
        .filter_map(|w| if w[0] > 0.0 && w[1] > 0.0 { Some((w[1] / w[0]).ln()) } else { None })
        .collect();
    let realized_volatility = f64_stddev(&log_returns).map(|sigma| sigma * annualization_factor.unwrap_or(1.0));

    MetricsResult {
        spread_mean,
        spread_median,
        spread_stddev,
        mean_bid_depth,
        mean_ask_depth,
        mean_depth_imbalance,
        order_flow_imbalance,
        vwap,
        total_volume,
        trade_count: trades.len(),
        realized_volatility,
    }
}

/// Fraction of `snapshots` in which a limit order on `side`, placed at
/// `mid * (1 + offset_bps / 10000)`, would have been immediately
/// marketable against the opposing best (i.e. would cross rather than
/// rest).
pub fn fill_probability(snapshots: &[OrderBookSnapshot], offset_bps: f64, side: Side) -> f64 {
    let offset_factor = Decimal::from_f64(1.0 + offset_bps / 10_000.0).unwrap_or(Decimal::ONE);
    let mut marketable = 0usize;
    let mut total = 0usize;
    for snapshot in snapshots {
        let Some(mid) = snapshot.mid_price else { continue };
        let opposing_best = match side {
            Side::Buy => snapshot.best_ask,
            Side::Sell => snapshot.best_bid,
        };
        let Some(opposing_best) = opposing_best else { continue };
        total += 1;
        let candidate_price = mid * offset_factor;
        let crosses = match side {
            Side::Buy => candidate_price >= opposing_best,
            Side::Sell => candidate_price <= opposing_best,
        };
        if crosses {
            marketable += 1;
        }
    }
    if total == 0 { 0.0 } else { marketable as f64 / total as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(best_bid: Decimal, best_ask: Decimal, bid_qty: Decimal, ask_qty: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: 0,
            symbol: "TEST".into(),
            bids: vec![(best_bid, bid_qty)],
            asks: vec![(best_ask, ask_qty)],
            best_bid: Some(best_bid),
            best_ask: Some(best_ask),
            spread: Some(best_ask - best_bid),
            mid_price: Some((best_bid + best_ask) / dec!(2)),
            last_trade_price: None,
        }
    }

    fn trade(id: u64, price: Decimal, quantity: Decimal, aggressor: Side) -> Trade {
        Trade { trade_id: id, price, quantity, buy_order_id: 1, sell_order_id: 2, aggressor_side: aggressor, timestamp: 0 }
    }

    #[test]
    fn vwap_and_volume_over_trades() {
        let trades = vec![
            trade(1, dec!(100), dec!(10), Side::Buy),
            trade(2, dec!(102), dec!(10), Side::Sell),
        ];
        let result = compute(&[], &trades, None);
        assert_eq!(result.total_volume, dec!(20));
        assert_eq!(result.vwap, Some(dec!(101)));
        assert_eq!(result.order_flow_imbalance, Some(0.0));
    }

    #[test]
    fn spread_stats_over_snapshots() {
        let snapshots = vec![
            snapshot(dec!(99), dec!(101), dec!(100), dec!(100)),
            snapshot(dec!(98), dec!(103), dec!(50), dec!(150)),
        ];
        let result = compute(&snapshots, &[], None);
        assert_eq!(result.spread_mean, Some(dec!(3.5)));
        assert!(result.mean_depth_imbalance.unwrap() < 0.0);
    }

    #[test]
    fn fill_probability_is_bounded() {
        let snapshots = vec![snapshot(dec!(99), dec!(101), dec!(100), dec!(100))];
        let p = fill_probability(&snapshots, 500.0, Side::Buy);
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(p, 1.0); // mid * 1.05 comfortably crosses a 101 ask
    }
}
