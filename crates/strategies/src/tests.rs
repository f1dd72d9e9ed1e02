use chrono::Utc;

use strategy_core::{
    lock_strategy, MarketData, NewsAnalysis, Strategy, StrategyCategory, StrategyError,
    StrategyState, TechnicalIndicators, TradingSignal,
};

use crate::conservative::{ConservativeConfig, ConservativeTrendStrategy};
use crate::momentum::{ModerateMomentumStrategy, MomentumConfig};
use crate::registry::StrategyRegistry;

fn market(price: f64, volume: f64) -> MarketData {
    MarketData {
        symbol: "BTC".to_string(),
        price,
        volume,
        timestamp: Utc::now(),
        high_24h: price * 1.02,
        low_24h: price * 0.98,
        change_24h: 1.0,
    }
}

fn indicators() -> TechnicalIndicators {
    TechnicalIndicators {
        rsi: 50.0,
        macd: 0.0,
        macd_signal: 0.0,
        macd_histogram: 0.0,
        ma20: 50_000.0,
        ma50: 50_000.0,
        ma200: 50_000.0,
        bb_upper: 51_000.0,
        bb_lower: 49_000.0,
        bb_position: 50.0,
        atr: 1_000.0,
        atr_percentage: 2.0,
        stoch_k: 50.0,
        williams_r: -50.0,
        volume_ratio: 1.0,
    }
}

fn negative_news() -> NewsAnalysis {
    NewsAnalysis {
        sentiment_score: -8,
        category: "regulation".to_string(),
        summary: "Exchange hack".to_string(),
        is_critical: true,
        confidence: 0.9,
        articles_count: 12,
    }
}

// Conservative: confirmed uptrend with oversold RSI and healthy volume.
fn uptrend_indicators() -> TechnicalIndicators {
    let mut ind = indicators();
    ind.rsi = 30.0;
    ind.ma50 = 51_500.0;
    ind.ma200 = 50_000.0;
    ind.volume_ratio = 1.5;
    ind
}

#[test]
fn conservative_buys_confirmed_uptrend() {
    let strategy = ConservativeTrendStrategy::new();
    let decision = strategy.analyze("BTC", &market(50_000.0, 1_000.0), &uptrend_indicators(), None);

    assert_eq!(decision.signal, TradingSignal::Buy);
    assert!(decision.confidence >= 0.6, "confidence {}", decision.confidence);

    let stop = decision.stop_loss.unwrap();
    let take = decision.take_profit.unwrap();
    assert!(stop < 50_000.0);
    assert!(take > 50_000.0);
    // 2x ATR stop, 3:1 reward.
    assert!((stop - 48_000.0).abs() < 1e-6);
    assert!((take - 56_000.0).abs() < 1e-6);

    assert!(decision.position_size > 0.0 && decision.position_size <= 0.05);
}

#[test]
fn conservative_sells_on_high_volatility() {
    let strategy = ConservativeTrendStrategy::new();
    let mut ind = uptrend_indicators();
    ind.atr_percentage = 6.0;
    ind.atr = 3_000.0;

    let decision = strategy.analyze("BTC", &market(50_000.0, 1_000.0), &ind, None);
    assert_eq!(decision.signal, TradingSignal::Sell);
    assert_eq!(decision.position_size, 0.0);
    assert!(decision.reasoning.contains("Volatility too high"));
}

#[test]
fn conservative_blocks_on_critical_news() {
    let strategy = ConservativeTrendStrategy::new();
    let decision = strategy.analyze(
        "BTC",
        &market(50_000.0, 1_000.0),
        &uptrend_indicators(),
        Some(&negative_news()),
    );
    assert_eq!(decision.signal, TradingSignal::Sell);
    assert!(decision.reasoning.contains("Critical negative news"));
}

#[test]
fn conservative_holds_without_trend() {
    let strategy = ConservativeTrendStrategy::new();
    let decision = strategy.analyze("BTC", &market(50_000.0, 1_000.0), &indicators(), None);
    assert_eq!(decision.signal, TradingSignal::Hold);
    assert_eq!(decision.position_size, 0.0);
}

#[test]
fn conservative_analyze_never_panics_on_bad_input() {
    let strategy = ConservativeTrendStrategy::new();
    let decision = strategy.analyze(
        "BTC",
        &market(f64::NAN, 1_000.0),
        &uptrend_indicators(),
        None,
    );
    assert_eq!(decision.signal, TradingSignal::Hold);
    assert_eq!(decision.confidence, 0.0);
}

#[test]
fn conservative_config_hard_checks() {
    let mut config = ConservativeConfig::default();
    config.min_position_size = 0.10;
    assert!(matches!(
        ConservativeTrendStrategy::with_config(config),
        Err(StrategyError::InvalidConfig(_))
    ));

    let mut config = ConservativeConfig::default();
    config.rsi_oversold = 80.0;
    assert!(ConservativeTrendStrategy::with_config(config).is_err());
}

// Momentum: everything aligned for a strong entry.
fn strong_momentum_indicators() -> TechnicalIndicators {
    let mut ind = indicators();
    ind.macd = 0.002;
    ind.macd_signal = 0.001;
    ind.macd_histogram = 0.001;
    ind.bb_position = 15.0;
    ind.volume_ratio = 1.5;
    ind.ma20 = 51_000.0;
    ind.ma50 = 50_500.0;
    ind.ma200 = 50_000.0;
    ind
}

#[test]
fn momentum_strong_buy_when_all_filters_agree() {
    let strategy = ModerateMomentumStrategy::new();
    let decision = strategy.analyze(
        "BTC",
        &market(50_000.0, 1_000.0),
        &strong_momentum_indicators(),
        None,
    );

    assert_eq!(decision.signal, TradingSignal::StrongBuy);
    assert!(decision.confidence >= 0.85);
    assert!(decision.stop_loss.unwrap() < 50_000.0);
    assert!(decision.take_profit.unwrap() > 50_000.0);
    assert!(decision.position_size > 0.0 && decision.position_size <= 0.1);
}

#[test]
fn momentum_sells_bearish_overbought() {
    let strategy = ModerateMomentumStrategy::new();
    let mut ind = indicators();
    ind.macd = -0.002;
    ind.macd_signal = -0.001;
    ind.macd_histogram = -0.001;
    ind.bb_position = 85.0;

    let decision = strategy.analyze("BTC", &market(50_000.0, 1_000.0), &ind, None);
    assert_eq!(decision.signal, TradingSignal::Sell);
    assert_eq!(decision.position_size, 0.0);
    assert!(decision.stop_loss.is_none());
}

#[test]
fn momentum_holds_outside_volatility_band() {
    let strategy = ModerateMomentumStrategy::new();
    let mut ind = strong_momentum_indicators();
    ind.atr_percentage = 5.0;

    let decision = strategy.analyze("BTC", &market(50_000.0, 1_000.0), &ind, None);
    assert_eq!(decision.signal, TradingSignal::Hold);
    assert!(decision.reasoning.contains("Volatility outside band"));
}

#[test]
fn momentum_buys_confirmed_breakout() {
    let strategy = ModerateMomentumStrategy::new();
    let decision = strategy.analyze(
        "BTC",
        &market(50_000.0, 1_000.0),
        &breakout_indicators(),
        None,
    );
    assert_eq!(decision.signal, TradingSignal::Buy);
    assert!((decision.confidence - 0.75).abs() < 1e-9);
}

// Breakout entries still answer to the hard gates.
fn breakout_indicators() -> TechnicalIndicators {
    let mut ind = indicators();
    ind.macd = 0.002;
    ind.macd_signal = 0.001;
    ind.macd_histogram = 0.0002;
    ind.bb_position = 96.0;
    ind.volume_ratio = 2.5;
    ind
}

#[test]
fn momentum_breakout_respects_volatility_veto() {
    let strategy = ModerateMomentumStrategy::new();
    let mut ind = breakout_indicators();
    ind.atr_percentage = 6.0;

    let decision = strategy.analyze("BTC", &market(50_000.0, 1_000.0), &ind, None);
    assert!(!decision.signal.is_buy());
    assert_eq!(decision.position_size, 0.0);
    assert!(decision.reasoning.contains("Volatility outside band"));
}

#[test]
fn momentum_breakout_respects_news_gate() {
    let strategy = ModerateMomentumStrategy::new();
    let decision = strategy.analyze(
        "BTC",
        &market(50_000.0, 1_000.0),
        &breakout_indicators(),
        Some(&negative_news()),
    );
    assert!(!decision.signal.is_buy());
    assert!(decision.stop_loss.is_none());
}

#[test]
fn momentum_demotes_below_confidence_floor() {
    let mut config = MomentumConfig::default();
    config.min_confidence_buy = 0.99;
    let strategy = ModerateMomentumStrategy::with_config(config).unwrap();

    let decision = strategy.analyze(
        "BTC",
        &market(50_000.0, 1_000.0),
        &strong_momentum_indicators(),
        None,
    );
    assert_eq!(decision.signal, TradingSignal::Hold);
    assert_eq!(decision.position_size, 0.0);
    assert!(decision.reasoning.contains("Confidence too low"));
}

#[test]
fn momentum_blocks_on_critical_news() {
    let strategy = ModerateMomentumStrategy::new();
    let decision = strategy.analyze(
        "BTC",
        &market(50_000.0, 1_000.0),
        &strong_momentum_indicators(),
        Some(&negative_news()),
    );
    assert!(!decision.signal.is_buy());
}

#[test]
fn registry_unknown_strategy_errors() {
    let registry = StrategyRegistry::with_builtins();
    assert!(matches!(
        registry.create("no_such_strategy"),
        Err(StrategyError::UnknownStrategy(_))
    ));
    assert!(!registry.contains("no_such_strategy"));
}

#[test]
fn registry_creates_builtins() {
    let registry = StrategyRegistry::with_builtins();
    let strategy = registry.create("conservative_trend").unwrap();
    assert_eq!(strategy.name(), "conservative_trend");
    assert_eq!(
        strategy.parameters()["name"].as_str().unwrap(),
        "conservative_trend"
    );
}

#[test]
fn registry_caches_shared_instances() {
    let mut registry = StrategyRegistry::with_builtins();
    let a = registry.get_instance("moderate_momentum").unwrap();
    let b = registry.get_instance("moderate_momentum").unwrap();
    assert!(std::sync::Arc::ptr_eq(&a, &b));

    // State accumulated through one handle is visible through the other.
    lock_strategy(&a).add_position("BTC", 50_000.0, 0.1, Utc::now(), None, None, "t");
    assert_eq!(lock_strategy(&b).open_positions(), 1);
}

#[test]
fn registry_lists_by_category() {
    let registry = StrategyRegistry::with_builtins();
    let infos = registry.list();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].name, "conservative_trend");

    assert_eq!(
        registry.get_by_category(StrategyCategory::Conservative),
        vec!["conservative_trend".to_string()]
    );
    assert_eq!(
        registry.get_by_category(StrategyCategory::Moderate),
        vec!["moderate_momentum".to_string()]
    );
    assert!(registry
        .get_by_category(StrategyCategory::Aggressive)
        .is_empty());
}

#[test]
fn registry_validate_reports_broken_builders() {
    let mut registry = StrategyRegistry::with_builtins();
    registry.register(
        "broken",
        "always fails to build",
        StrategyCategory::Aggressive,
        || {
            Err(StrategyError::InvalidConfig(
                "cannot construct".to_string(),
            ))
        },
    );

    let report = registry.validate();
    assert!(!report.all_valid());
    assert_eq!(report.valid.len(), 2);
    assert_eq!(report.invalid.len(), 1);
    assert_eq!(report.invalid[0].0, "broken");
}

// Custom strategies slot in beside the builtins.
struct NullStrategy {
    state: StrategyState,
}

impl Strategy for NullStrategy {
    fn name(&self) -> &str {
        "null"
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Aggressive
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({ "name": "null" })
    }

    fn evaluate(
        &self,
        _symbol: &str,
        _market: &MarketData,
        _indicators: &TechnicalIndicators,
        _news: Option<&NewsAnalysis>,
    ) -> Result<strategy_core::TradingDecision, StrategyError> {
        Ok(strategy_core::TradingDecision::hold("null"))
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StrategyState {
        &mut self.state
    }
}

#[test]
fn registry_accepts_custom_strategies() {
    let mut registry = StrategyRegistry::new();
    registry.register("null", "does nothing", StrategyCategory::Aggressive, || {
        Ok(Box::new(NullStrategy {
            state: StrategyState::new(1, 0.5),
        }))
    });

    assert!(registry.contains("null"));
    let instance = registry.get_instance("null").unwrap();
    let decision = lock_strategy(&instance).analyze(
        "BTC",
        &market(1.0, 1.0),
        &indicators(),
        None,
    );
    assert_eq!(decision.signal, TradingSignal::Hold);
}
