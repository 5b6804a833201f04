//! Drives an event source against a [`LimitOrderBook`] at a configurable
//! pace, notifying an observer of trades and periodic snapshots.
//!
//! The pacing and cooperative-stop shape follows the quoting loop used
//! elsewhere in this crate: a `tokio::select!` racing the next scheduled
//! action against `CancellationToken::cancelled()`, fed by
//! [`crate::utils::shutdown_token`].

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::generator::GeneratorEvent;
use crate::orderbook::LimitOrderBook;
use crate::snapshot::OrderBookSnapshot;
use crate::trade::Trade;

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// 1.0 paces events at simulated wall-clock speed; values above 1.0 run
    /// faster than real time. `0.0` (or negative) disables pacing entirely
    /// and replays as fast as the CPU allows — the mode used by backtests.
    pub speed_multiplier: f64,
    pub snapshot_interval_seconds: f64,
    pub snapshot_levels: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { speed_multiplier: 0.0, snapshot_interval_seconds: 1.0, snapshot_levels: crate::orderbook::DEFAULT_SNAPSHOT_LEVELS }
    }
}

/// Callback surface a replay run reports into. All methods default to a
/// no-op, so an observer only implements what it cares about.
pub trait ReplayObserver {
    fn on_trade(&mut self, _trade: &Trade) {}
    fn on_snapshot(&mut self, _snapshot: &OrderBookSnapshot) {}
    fn on_event(&mut self, _elapsed_seconds: f64) {}
    /// Invoked once the event source is exhausted or `stop()` halts the
    /// run. Fires exactly once per `run` call, whichever way it ends.
    fn on_complete(&mut self) {}
}

/// Pumps a timestamped event stream into a book, pacing itself against
/// wall-clock time and reporting trades/snapshots as it goes.
pub struct ReplayEngine {
    book: LimitOrderBook,
    config: ReplayConfig,
    stop_token: CancellationToken,
}

impl ReplayEngine {
    pub fn new(book: LimitOrderBook, config: ReplayConfig) -> Self {
        Self { book, config, stop_token: CancellationToken::new() }
    }

    /// A clone of this engine's stop token; cancelling it (or wiring it to
    /// [`crate::utils::shutdown_token`]) ends the run after the
    /// in-flight event finishes processing.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop_token.clone()
    }

    pub fn book(&self) -> &LimitOrderBook {
        &self.book
    }

    pub fn into_book(self) -> LimitOrderBook {
        self.book
    }

    /// Consumes `events` in order, applying each to the book and pacing
    /// itself according to `speed_multiplier`. Returns once the source is
    /// exhausted or the stop token fires.
    pub async fn run<I, O>(&mut self, events: I, observer: &mut O)
    where
        I: IntoIterator<Item = (f64, GeneratorEvent)>,
        O: ReplayObserver,
    {
        let start = Instant::now();
        let mut last_snapshot_at = 0.0_f64;

        for (elapsed, event) in events {
            if self.stop_token.is_cancelled() {
                debug!("replay stopped before exhausting event source");
                break;
            }

            if self.config.speed_multiplier > 0.0 {
                let target = Duration::from_secs_f64(elapsed / self.config.speed_multiplier);
                let now = start.elapsed();
                if target > now {
                    tokio::select! {
                        _ = tokio::time::sleep(target - now) => {}
                        _ = self.stop_token.cancelled() => break,
                    }
                }
            }

            match event {
                GeneratorEvent::New(order) => {
                    let ack = self.book.add_order(order);
                    for trade in &ack.trades {
                        observer.on_trade(trade);
                    }
                }
                GeneratorEvent::Cancel(order_id) => {
                    self.book.cancel_order(order_id);
                }
            }
            observer.on_event(elapsed);

            if elapsed - last_snapshot_at >= self.config.snapshot_interval_seconds {
                last_snapshot_at = elapsed;
                let snapshot = self.book.get_snapshot((elapsed * 1e9) as i64, self.config.snapshot_levels);
                observer.on_snapshot(&snapshot);
            }
        }

        observer.on_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GeneratorConfig, PoissonOrderGenerator};
    use rust_decimal::Decimal;

    #[derive(Default)]
    struct RecordingObserver {
        trades: Vec<Trade>,
        snapshots: usize,
        events: usize,
        completed: usize,
    }

    impl ReplayObserver for RecordingObserver {
        fn on_trade(&mut self, trade: &Trade) {
            self.trades.push(trade.clone());
        }
        fn on_snapshot(&mut self, _snapshot: &OrderBookSnapshot) {
            self.snapshots += 1;
        }
        fn on_event(&mut self, _elapsed_seconds: f64) {
            self.events += 1;
        }
        fn on_complete(&mut self) {
            self.completed += 1;
        }
    }

    fn fast_config() -> GeneratorConfig {
        GeneratorConfig {
            symbol: "TEST".into(),
            base_price: Decimal::from(100),
            tick_size: Decimal::new(1, 2),
            arrival_rate: 50.0,
            cancel_prob: 0.1,
            quantity_mu: 2.0,
            quantity_sigma: 0.3,
            mean_spread_ticks: 3.0,
            volatility: 0.02,
            seed: 99,
            duration_seconds: 1.0,
        }
    }

    #[tokio::test]
    async fn unpaced_replay_drains_the_full_event_source() {
        let book = LimitOrderBook::new("TEST");
        let config = ReplayConfig { speed_multiplier: 0.0, snapshot_interval_seconds: 0.1, snapshot_levels: 5 };
        let mut engine = ReplayEngine::new(book, config);
        let generator = PoissonOrderGenerator::new(fast_config());
        let expected = PoissonOrderGenerator::new(fast_config()).count();

        let mut observer = RecordingObserver::default();
        engine.run(generator, &mut observer).await;

        assert_eq!(observer.events, expected);
        assert_eq!(observer.completed, 1);
        assert!(engine.book().check_invariants().is_ok());
    }

    #[tokio::test]
    async fn stop_token_halts_processing_early() {
        let book = LimitOrderBook::new("TEST");
        let config = ReplayConfig { speed_multiplier: 0.0, snapshot_interval_seconds: 10.0, snapshot_levels: 5 };
        let mut engine = ReplayEngine::new(book, config);
        engine.stop_token().cancel();

        let generator = PoissonOrderGenerator::new(fast_config());
        let mut observer = RecordingObserver::default();
        engine.run(generator, &mut observer).await;

        assert_eq!(observer.events, 0);
        assert_eq!(observer.completed, 1);
    }
}
