use lob_engine::backtester::Backtester;
use lob_engine::generator::{GeneratorConfig, PoissonOrderGenerator};
use lob_engine::orderbook::LimitOrderBook;
use lob_engine::orders::Side;
use lob_engine::replay::ReplayConfig;
use lob_engine::strategy::{StrategyKind, Twap, TwapConfig};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn deep_liquidity_generator(seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        symbol: "SIM".into(),
        base_price: dec!(100),
        tick_size: dec!(0.01),
        arrival_rate: 20.0,
        cancel_prob: 0.05,
        quantity_mu: 5.0,
        quantity_sigma: 0.3,
        mean_spread_ticks: 2.0,
        volatility: 0.002,
        seed,
        duration_seconds: 60.0,
    }
}

/// Spec scenario 6: a TWAP slicing its target into ten roughly-even
/// clips against a continuously replenished opposite side.
#[tokio::test]
async fn twap_backtest_slices_into_ten_children() {
    let book = LimitOrderBook::new("SIM");
    let replay_config = ReplayConfig { speed_multiplier: 0.0, snapshot_interval_seconds: 1.0, snapshot_levels: 10 };
    let mut backtester = Backtester::new(book, replay_config, None);

    let twap_cfg = TwapConfig {
        target_quantity: dec!(1000),
        side: Side::Buy,
        num_slices: 10,
        duration_seconds: 60.0,
        aggression: 0.9,
    };
    let mut strategy = StrategyKind::Twap(Twap::new(twap_cfg, 1_000_000));

    let generator = PoissonOrderGenerator::new(deep_liquidity_generator(7));
    let results = backtester.run(generator, &mut strategy).await;

    assert_eq!(results.child_order_count, 10);
    assert!(results.executed_quantity > Decimal::ZERO);
    assert!(results.executed_quantity <= dec!(1000));
    assert!(results.fill_rate > 0.0 && results.fill_rate <= 1.0);
}

#[tokio::test]
async fn backtest_is_deterministic_for_a_fixed_seed() {
    let run_once = || async {
        let book = LimitOrderBook::new("SIM");
        let replay_config = ReplayConfig { speed_multiplier: 0.0, snapshot_interval_seconds: 1.0, snapshot_levels: 10 };
        let mut backtester = Backtester::new(book, replay_config, None);
        let twap_cfg = TwapConfig { target_quantity: dec!(500), side: Side::Buy, num_slices: 5, duration_seconds: 30.0, aggression: 0.9 };
        let mut strategy = StrategyKind::Twap(Twap::new(twap_cfg, 1_000_000));
        let generator = PoissonOrderGenerator::new(deep_liquidity_generator(123));
        backtester.run(generator, &mut strategy).await
    };

    let a = run_once().await;
    let b = run_once().await;
    assert_eq!(a.executed_quantity, b.executed_quantity);
    assert_eq!(a.child_order_count, b.child_order_count);
    assert_eq!(a.fill_count, b.fill_count);
}
