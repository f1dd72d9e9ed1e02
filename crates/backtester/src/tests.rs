use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, TimeZone, Utc};

use strategies::{ConservativeConfig, ConservativeTrendStrategy};
use strategy_core::{
    share, MarketData, NewsAnalysis, Strategy, StrategyCategory, StrategyError, StrategyState,
    TechnicalIndicators, TradingDecision, TradingSignal,
};

use crate::engine::Backtester;
use crate::models::HistoricalSnapshot;
use crate::sweep::run_parameter_sweep;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn bullish_indicators() -> TechnicalIndicators {
    TechnicalIndicators {
        rsi: 30.0,
        macd: 0.002,
        macd_signal: 0.001,
        macd_histogram: 0.001,
        ma20: 52_000.0,
        ma50: 51_500.0,
        ma200: 50_000.0,
        bb_upper: 53_000.0,
        bb_lower: 49_000.0,
        bb_position: 40.0,
        atr: 1_000.0,
        atr_percentage: 2.0,
        stoch_k: 40.0,
        williams_r: -60.0,
        volume_ratio: 1.5,
    }
}

fn snapshot(symbol: &str, price: f64, hours: i64) -> HistoricalSnapshot {
    HistoricalSnapshot {
        market: MarketData {
            symbol: symbol.to_string(),
            price,
            volume: 1_000.0,
            timestamp: base_time() + Duration::hours(hours),
            high_24h: price * 1.02,
            low_24h: price * 0.98,
            change_24h: 1.0,
        },
        indicators: bullish_indicators(),
        news: None,
    }
}

fn rising_series(symbol: &str) -> HashMap<String, Vec<HistoricalSnapshot>> {
    let mut data = HashMap::new();
    data.insert(
        symbol.to_string(),
        vec![
            snapshot(symbol, 50_000.0, 0),
            snapshot(symbol, 51_000.0, 1),
            snapshot(symbol, 52_000.0, 2),
        ],
    );
    data
}

/// Scripted strategy: buys inside [buy_min, buy_max], sells above a ceiling.
struct ThresholdStrategy {
    state: StrategyState,
    buy_min: f64,
    buy_max: f64,
    sell_above: f64,
    stop_loss: Option<f64>,
    size: f64,
}

impl ThresholdStrategy {
    fn new(buy_min: f64, buy_max: f64, sell_above: f64, size: f64) -> Self {
        Self {
            state: StrategyState::new(10, 0.5),
            buy_min,
            buy_max,
            sell_above,
            stop_loss: None,
            size,
        }
    }
}

impl Strategy for ThresholdStrategy {
    fn name(&self) -> &str {
        "threshold"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Aggressive
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "name": "threshold" })
    }

    fn evaluate(
        &self,
        _symbol: &str,
        market: &MarketData,
        _indicators: &TechnicalIndicators,
        _news: Option<&NewsAnalysis>,
    ) -> Result<TradingDecision, StrategyError> {
        if market.price >= self.sell_above {
            return Ok(TradingDecision {
                signal: TradingSignal::Sell,
                confidence: 0.9,
                reasoning: "above ceiling".to_string(),
                stop_loss: None,
                take_profit: None,
                position_size: 0.0,
            });
        }
        if market.price >= self.buy_min && market.price <= self.buy_max {
            return Ok(TradingDecision {
                signal: TradingSignal::Buy,
                confidence: 0.9,
                reasoning: "below floor".to_string(),
                stop_loss: self.stop_loss,
                take_profit: None,
                position_size: self.size,
            });
        }
        Ok(TradingDecision::hold("inside band"))
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StrategyState {
        &mut self.state
    }
}

#[test]
fn rising_series_opens_and_closes_at_backtest_end() {
    let mut engine = Backtester::new(100_000.0);
    engine.add_strategy(share(Box::new(ConservativeTrendStrategy::new())));

    let data = rising_series("BTC");
    let results = engine
        .run(&data, base_time(), base_time() + Duration::hours(3))
        .unwrap();

    let result = &results["conservative_trend"];
    assert_eq!(result.total_trades, 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, "Backtest End");
    assert!((trade.entry_price - 50_000.0).abs() < 1e-9);
    assert!((trade.exit_price - 52_000.0).abs() < 1e-9);
    assert!(trade.pnl > 0.0);
    assert!(result.final_capital >= result.initial_capital);
    assert!((engine.final_capital() - (100_000.0 + trade.pnl)).abs() < 1e-6);
}

#[test]
fn timestamps_replay_in_order_across_symbols() {
    let mut engine = Backtester::new(100_000.0);
    // Empty buy band: the strategy only holds.
    engine.add_strategy(share(Box::new(ThresholdStrategy::new(1.0, 0.0, f64::MAX, 0.05))));

    // Interleaved timestamps across two symbols.
    let mut data = HashMap::new();
    data.insert(
        "BTC".to_string(),
        vec![snapshot("BTC", 50_000.0, 0), snapshot("BTC", 50_500.0, 2)],
    );
    data.insert(
        "ETH".to_string(),
        vec![snapshot("ETH", 3_000.0, 1), snapshot("ETH", 3_100.0, 3)],
    );

    engine
        .run(&data, base_time(), base_time() + Duration::hours(10))
        .unwrap();

    let curve = engine.equity_curve();
    assert_eq!(curve.len(), 4);
    assert!(curve.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[test]
fn stop_loss_closes_during_replay() {
    let mut strategy = ThresholdStrategy::new(99.0, 101.0, f64::MAX, 0.1);
    strategy.stop_loss = Some(95.0);

    let mut engine = Backtester::new(10_000.0);
    engine.add_strategy(share(Box::new(strategy)));

    let mut data = HashMap::new();
    data.insert(
        "BTC".to_string(),
        vec![
            snapshot("BTC", 100.0, 0),
            snapshot("BTC", 94.0, 1),
            // Outside the buy band, so no re-entry after the stop.
            snapshot("BTC", 102.0, 2),
        ],
    );

    let results = engine
        .run(&data, base_time(), base_time() + Duration::hours(10))
        .unwrap();

    let result = &results["threshold"];
    assert_eq!(result.total_trades, 1);
    assert_eq!(result.trades[0].exit_reason, "Stop-Loss");
    assert!(result.trades[0].pnl < 0.0);
    assert_eq!(result.losing_trades, 1);
    assert!(result.max_drawdown > 0.0);
}

#[test]
fn strategy_sell_closes_long_only() {
    let mut engine = Backtester::new(10_000.0);
    engine.add_strategy(share(Box::new(ThresholdStrategy::new(99.0, 101.0, 110.0, 0.1))));

    let mut data = HashMap::new();
    data.insert(
        "BTC".to_string(),
        vec![
            snapshot("BTC", 100.0, 0),
            snapshot("BTC", 112.0, 1),
            // Still above the ceiling: a sell with nothing open must not short.
            snapshot("BTC", 115.0, 2),
        ],
    );

    let results = engine
        .run(&data, base_time(), base_time() + Duration::hours(10))
        .unwrap();

    let result = &results["threshold"];
    assert_eq!(result.total_trades, 1);
    assert_eq!(result.trades[0].exit_reason, "Strategy Signal");
    assert!(result.trades[0].pnl > 0.0);
    assert_eq!(result.win_rate, 1.0);
}

#[test]
fn final_capital_accounts_for_every_trade_once() {
    let mut engine = Backtester::new(10_000.0);
    engine.add_strategy(share(Box::new(ThresholdStrategy::new(98.0, 101.0, 110.0, 0.1))));

    let mut data = HashMap::new();
    data.insert(
        "BTC".to_string(),
        vec![
            snapshot("BTC", 100.0, 0),
            snapshot("BTC", 111.0, 1),
            snapshot("BTC", 99.0, 2),
            snapshot("BTC", 112.0, 3),
        ],
    );

    let results = engine
        .run(&data, base_time(), base_time() + Duration::hours(10))
        .unwrap();

    let result = &results["threshold"];
    assert_eq!(result.total_trades, 2);
    let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
    assert!((engine.final_capital() - (10_000.0 + pnl_sum)).abs() < 1e-6);
    assert!((result.total_return - pnl_sum).abs() < 1e-9);
}

#[test]
fn empty_range_is_an_error() {
    let mut engine = Backtester::new(10_000.0);
    engine.add_strategy(share(Box::new(ConservativeTrendStrategy::new())));

    let data = rising_series("BTC");
    let err = engine.run(
        &data,
        base_time() + Duration::days(30),
        base_time() + Duration::days(31),
    );
    assert!(err.is_err());
}

#[test]
fn run_without_strategies_is_an_error() {
    let mut engine = Backtester::new(10_000.0);
    let data = rising_series("BTC");
    assert!(engine
        .run(&data, base_time(), base_time() + Duration::hours(10))
        .is_err());
}

#[test]
fn parameter_sweep_isolates_failing_combinations() {
    let data = rising_series("BTC");

    let mut ranges = BTreeMap::new();
    // 0.005 is below the minimum position size and fails construction.
    ranges.insert("max_position_size".to_string(), vec![0.05, 0.08, 0.005]);

    let results = run_parameter_sweep(
        |combo| {
            let mut config = ConservativeConfig::default();
            config.max_position_size = combo["max_position_size"];
            let strategy = ConservativeTrendStrategy::with_config(config)?;
            Ok(Box::new(strategy) as Box<dyn Strategy>)
        },
        &ranges,
        100_000.0,
        &data,
        base_time(),
        base_time() + Duration::hours(10),
    );

    assert_eq!(results.len(), 2);
    assert!(results.contains_key("max_position_size=0.05"));
    assert!(results.contains_key("max_position_size=0.08"));
    assert!(!results.contains_key("max_position_size=0.005"));

    for combo_results in results.values() {
        assert_eq!(combo_results["conservative_trend"].total_trades, 1);
    }
}
