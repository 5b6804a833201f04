use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lob_engine::backtester::Backtester;
use lob_engine::generator::{GeneratorConfig, PoissonOrderGenerator};
use lob_engine::orderbook::{LimitOrderBook, DEFAULT_SNAPSHOT_LEVELS};
use lob_engine::orders::Side;
use lob_engine::replay::{ReplayConfig, ReplayEngine, ReplayObserver};
use lob_engine::snapshot::OrderBookSnapshot;
use lob_engine::strategy::{Pov, PovConfig, Posting, PostingConfig, StrategyKind, Twap, TwapConfig, Vwap, VwapConfig, default_u_shape_profile};
use lob_engine::trade::Trade;
use lob_engine::utils::shutdown_token;

#[derive(Parser)]
#[command(name = "lob-engine")]
#[command(version, about = "A limit-order-book matching engine: live replay and strategy backtesting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pace a synthetic order flow into a fresh book and print trades/snapshots as they happen.
    Replay(ReplayArgs),
    /// Run an execution strategy against a synthetic order flow and print the resulting metrics.
    Backtest(BacktestArgs),
}

#[derive(clap::Args, Clone)]
struct GeneratorArgs {
    #[arg(long, default_value = "SIM")]
    symbol: String,
    #[arg(long, default_value_t = 100.0)]
    base_price: f64,
    #[arg(long, default_value_t = 0.01)]
    tick_size: f64,
    #[arg(long, default_value_t = 10.0)]
    arrival_rate: f64,
    #[arg(long, default_value_t = 0.1)]
    cancel_prob: f64,
    #[arg(long, default_value_t = 3.0)]
    quantity_mu: f64,
    #[arg(long, default_value_t = 0.5)]
    quantity_sigma: f64,
    #[arg(long, default_value_t = 5.0)]
    mean_spread_ticks: f64,
    #[arg(long, default_value_t = 0.01)]
    volatility: f64,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 60.0)]
    duration_seconds: f64,
}

impl GeneratorArgs {
    fn into_config(self) -> GeneratorConfig {
        GeneratorConfig {
            symbol: self.symbol,
            base_price: Decimal::from_f64(self.base_price).unwrap_or_else(|| Decimal::from(100)),
            tick_size: Decimal::from_f64(self.tick_size).unwrap_or(Decimal::new(1, 2)),
            arrival_rate: self.arrival_rate,
            cancel_prob: self.cancel_prob,
            quantity_mu: self.quantity_mu,
            quantity_sigma: self.quantity_sigma,
            mean_spread_ticks: self.mean_spread_ticks,
            volatility: self.volatility,
            seed: self.seed,
            duration_seconds: self.duration_seconds,
        }
    }
}

#[derive(clap::Args)]
struct ReplayArgs {
    #[command(flatten)]
    generator: GeneratorArgs,
    /// 1.0 paces in real time; 0 replays as fast as possible.
    #[arg(long, default_value_t = 1.0)]
    speed_multiplier: f64,
    #[arg(long, default_value_t = 1.0)]
    snapshot_interval_seconds: f64,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum StrategyChoice {
    Twap,
    Vwap,
    Pov,
    Posting,
}

#[derive(clap::ValueEnum, Clone, Copy)]
enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for Side {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Buy => Side::Buy,
            SideArg::Sell => Side::Sell,
        }
    }
}

#[derive(clap::Args)]
struct BacktestArgs {
    #[command(flatten)]
    generator: GeneratorArgs,
    #[arg(long, value_enum, default_value_t = StrategyChoice::Twap)]
    strategy: StrategyChoice,
    #[arg(long, value_enum, default_value_t = SideArg::Buy)]
    side: SideArg,
    #[arg(long, default_value_t = 1000.0)]
    target_quantity: f64,
    #[arg(long, default_value_t = 1.0)]
    snapshot_interval_seconds: f64,
    /// TWAP only: number of equal-sized slices.
    #[arg(long, default_value_t = 10)]
    num_slices: u32,
    /// TWAP/VWAP aggression ladder: <=0.5 passive, (0.5,0.8] mid, >0.8 market.
    #[arg(long, default_value_t = 0.3)]
    aggression: f64,
    /// POV only: fraction of observed market volume to chase.
    #[arg(long, default_value_t = 0.1)]
    participation_rate: f64,
    /// Posting only: 0.0 joins the best, 1.0 crosses to the opposite touch.
    #[arg(long, default_value_t = 0.25)]
    fraction: f64,
    /// Posting only: absolute mid drift that triggers a re-quote.
    #[arg(long, default_value_t = 0.05)]
    reprice_threshold: f64,
}

impl BacktestArgs {
    fn build_strategy(&self) -> StrategyKind {
        let side: Side = self.side.into();
        let target = Decimal::from_f64(self.target_quantity).unwrap_or(Decimal::ZERO);
        match self.strategy {
            StrategyChoice::Twap => StrategyKind::Twap(Twap::new(
                TwapConfig { target_quantity: target, side, num_slices: self.num_slices, duration_seconds: self.generator.duration_seconds, aggression: self.aggression },
                1,
            )),
            StrategyChoice::Vwap => StrategyKind::Vwap(Vwap::new(
                VwapConfig { target_quantity: target, side, duration_seconds: self.generator.duration_seconds, profile: default_u_shape_profile() },
                1,
            )),
            StrategyChoice::Pov => StrategyKind::Pov(Pov::new(
                PovConfig { target_quantity: target, side, participation_rate: self.participation_rate },
                1,
            )),
            StrategyChoice::Posting => StrategyKind::Posting(Posting::new(
                PostingConfig {
                    target_quantity: target,
                    side,
                    fraction: Decimal::from_f64(self.fraction).unwrap_or(Decimal::ZERO),
                    reprice_threshold: Decimal::from_f64(self.reprice_threshold).unwrap_or(Decimal::ZERO),
                },
                1,
            )),
        }
    }
}

struct LoggingObserver;

impl ReplayObserver for LoggingObserver {
    fn on_trade(&mut self, trade: &Trade) {
        info!(trade_id = trade.trade_id, price = %trade.price, quantity = %trade.quantity, "trade");
    }

    fn on_snapshot(&mut self, snapshot: &OrderBookSnapshot) {
        if let Ok(json) = serde_json::to_string(snapshot) {
            info!(%json, "snapshot");
        }
    }

    fn on_complete(&mut self) {
        info!("replay complete");
    }
}

async fn run_replay(args: ReplayArgs) -> anyhow::Result<()> {
    let book = LimitOrderBook::new(args.generator.symbol.clone());
    let config = ReplayConfig {
        speed_multiplier: args.speed_multiplier,
        snapshot_interval_seconds: args.snapshot_interval_seconds,
        snapshot_levels: DEFAULT_SNAPSHOT_LEVELS,
    };
    let mut engine = ReplayEngine::new(book, config);

    let external_stop = shutdown_token();
    let engine_stop = engine.stop_token();
    tokio::spawn(async move {
        external_stop.cancelled().await;
        engine_stop.cancel();
    });

    let generator = PoissonOrderGenerator::new(args.generator.into_config());
    let mut observer = LoggingObserver;
    engine.run(generator, &mut observer).await;

    let counters = engine.book().counters();
    info!(total_orders = counters.total_orders_received, total_trades = counters.total_trades, total_volume = %counters.total_volume, "replay complete");
    Ok(())
}

async fn run_backtest(args: BacktestArgs) -> anyhow::Result<()> {
    let book = LimitOrderBook::new(args.generator.symbol.clone());
    let replay_config = ReplayConfig {
        speed_multiplier: 0.0,
        snapshot_interval_seconds: args.snapshot_interval_seconds,
        snapshot_levels: DEFAULT_SNAPSHOT_LEVELS,
    };
    let mut strategy = args.build_strategy();
    let generator_config = args.generator.clone().into_config();
    let mut backtester = Backtester::new(book, replay_config, None);

    let generator = PoissonOrderGenerator::new(generator_config);
    let results = backtester.run(generator, &mut strategy).await;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => run_replay(args).await,
        Commands::Backtest(args) => run_backtest(args).await,
    }
}
