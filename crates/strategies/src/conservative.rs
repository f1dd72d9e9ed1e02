//! Conservative trend-following strategy.
//!
//! Trades only with a confirmed MA50/MA200 trend, prefers low volatility,
//! and exits aggressively on any deterioration. Long holding periods,
//! strict risk management.

use serde::{Deserialize, Serialize};
use serde_json::json;

use strategy_core::helpers;
use strategy_core::{
    MarketData, NewsAnalysis, Strategy, StrategyCategory, StrategyError, StrategyState,
    TechnicalIndicators, TradingDecision, TradingSignal, TrendDirection,
};

pub const CONSERVATIVE_TREND: &str = "conservative_trend";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConservativeConfig {
    // Risk management
    pub max_position_size: f64,
    pub min_position_size: f64,
    pub stop_loss_atr_multiplier: f64,
    pub take_profit_ratio: f64,

    // Oscillator filter
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,

    // Volatility and volume gates
    pub max_atr_percentage: f64,
    pub min_volume_ratio: f64,

    // Trend filter: minimum relative MA50/MA200 gap
    pub min_trend_strength: f64,

    // News gate
    pub min_news_sentiment: i32,

    // Validation limits
    pub min_confidence_buy: f64,
    pub max_positions: usize,
}

impl Default for ConservativeConfig {
    fn default() -> Self {
        Self {
            max_position_size: 0.05,
            min_position_size: 0.01,
            stop_loss_atr_multiplier: 2.0,
            take_profit_ratio: 3.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            max_atr_percentage: 3.0,
            min_volume_ratio: 0.8,
            min_trend_strength: 0.02,
            min_news_sentiment: -5,
            min_confidence_buy: 0.6,
            max_positions: 5,
        }
    }
}

impl ConservativeConfig {
    /// Hard errors that make the configuration unusable.
    pub fn check(&self) -> Result<(), StrategyError> {
        if self.min_position_size <= 0.0 || self.min_position_size >= self.max_position_size {
            return Err(StrategyError::InvalidConfig(format!(
                "position size bounds invalid: min {} max {}",
                self.min_position_size, self.max_position_size
            )));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(StrategyError::InvalidConfig(
                "rsi_oversold must be below rsi_overbought".to_string(),
            ));
        }
        if self.take_profit_ratio <= 0.0 || self.stop_loss_atr_multiplier <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "stop/take multipliers must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Soft warnings for risky but usable settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_position_size > 0.10 {
            warnings.push("position size > 10% is very risky for a conservative strategy".to_string());
        }
        if self.stop_loss_atr_multiplier < 1.5 {
            warnings.push("stop-loss < 1.5x ATR may cause premature exits".to_string());
        }
        if self.take_profit_ratio < 2.0 {
            warnings.push("risk/reward < 2:1 is low for a conservative strategy".to_string());
        }
        warnings
    }
}

enum RsiZone {
    Oversold,
    Overbought,
    Neutral,
}

pub struct ConservativeTrendStrategy {
    config: ConservativeConfig,
    state: StrategyState,
}

impl Default for ConservativeTrendStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ConservativeTrendStrategy {
    pub fn new() -> Self {
        // Defaults always pass the hard checks.
        Self::build(ConservativeConfig::default())
    }

    pub fn with_config(config: ConservativeConfig) -> Result<Self, StrategyError> {
        config.check()?;
        Ok(Self::build(config))
    }

    fn build(config: ConservativeConfig) -> Self {
        for warning in config.validate() {
            tracing::warn!("[{}] {}", CONSERVATIVE_TREND, warning);
        }
        let state = StrategyState::new(config.max_positions, config.min_confidence_buy);
        tracing::info!("Strategy initialized: {} (conservative)", CONSERVATIVE_TREND);
        Self { config, state }
    }

    fn rsi_zone(&self, indicators: &TechnicalIndicators) -> RsiZone {
        if indicators.rsi <= self.config.rsi_oversold {
            RsiZone::Oversold
        } else if indicators.rsi >= self.config.rsi_overbought {
            RsiZone::Overbought
        } else {
            RsiZone::Neutral
        }
    }

    fn news_ok(&self, news: Option<&NewsAnalysis>) -> bool {
        match news {
            Some(n) => !(n.sentiment_score <= self.config.min_news_sentiment && n.is_critical),
            None => true,
        }
    }
}

impl Strategy for ConservativeTrendStrategy {
    fn name(&self) -> &str {
        CONSERVATIVE_TREND
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Conservative
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "name": CONSERVATIVE_TREND,
            "type": "trend_following",
            "risk_level": "conservative",
            "config": self.config,
        })
    }

    fn evaluate(
        &self,
        _symbol: &str,
        market: &MarketData,
        indicators: &TechnicalIndicators,
        news: Option<&NewsAnalysis>,
    ) -> Result<TradingDecision, StrategyError> {
        helpers::check_inputs(market, indicators)?;

        let (trend, trend_strength) = helpers::trend_direction(
            indicators.ma50,
            indicators.ma200,
            self.config.min_trend_strength,
        );
        let volatility_ok = indicators.atr_percentage <= self.config.max_atr_percentage;
        let rsi = self.rsi_zone(indicators);
        let volume_ok = indicators.volume_ratio >= self.config.min_volume_ratio;
        let news_ok = self.news_ok(news);

        let mut reasons: Vec<String> = Vec::new();

        // Entry: confirmed uptrend with every gate open and RSI not stretched.
        if trend == TrendDirection::Bullish
            && volatility_ok
            && !matches!(rsi, RsiZone::Overbought)
            && volume_ok
            && news_ok
        {
            let mut confidence = 0.5 + (trend_strength * 5.0).min(0.2);
            reasons.push("Bullish trend (MA50 > MA200)".to_string());
            reasons.push(format!("Trend strength {:.2}%", trend_strength * 100.0));

            if matches!(rsi, RsiZone::Oversold) {
                confidence += 0.1;
                reasons.push("RSI oversold, favorable entry".to_string());
            }
            confidence += 0.05;
            reasons.push("Volume confirmed".to_string());
            reasons.push("Volatility in range".to_string());

            let confidence = confidence.clamp(0.0, 0.95);

            if confidence < self.config.min_confidence_buy {
                reasons.push(format!("Confidence too low ({:.2})", confidence));
                return Ok(TradingDecision {
                    signal: TradingSignal::Hold,
                    confidence,
                    reasoning: reasons.join(" | "),
                    stop_loss: None,
                    take_profit: None,
                    position_size: 0.0,
                });
            }

            let (stop_loss, take_profit) = helpers::risk_levels(
                market.price,
                indicators.atr,
                self.config.stop_loss_atr_multiplier,
                self.config.take_profit_ratio,
            );
            let position_size = helpers::adaptive_position_size(
                self.config.min_position_size,
                self.config.max_position_size,
                confidence,
                indicators.atr_percentage,
                false,
            );

            return Ok(TradingDecision {
                signal: TradingSignal::Buy,
                confidence,
                reasoning: reasons.join(" | "),
                stop_loss: Some(stop_loss),
                take_profit: Some(take_profit),
                position_size,
            });
        }

        // Exit: any deterioration ends the position.
        if trend == TrendDirection::Bearish
            || matches!(rsi, RsiZone::Overbought)
            || !volatility_ok
            || !news_ok
        {
            if trend == TrendDirection::Bearish {
                reasons.push("Bearish trend (MA50 < MA200)".to_string());
            }
            if matches!(rsi, RsiZone::Overbought) {
                reasons.push("RSI overbought".to_string());
            }
            if !volatility_ok {
                reasons.push(format!(
                    "Volatility too high ({:.1}% ATR)",
                    indicators.atr_percentage
                ));
            }
            if !news_ok {
                reasons.push("Critical negative news".to_string());
            }

            return Ok(TradingDecision {
                signal: TradingSignal::Sell,
                confidence: 0.6,
                reasoning: reasons.join(" | "),
                stop_loss: None,
                take_profit: None,
                position_size: 0.0,
            });
        }

        Ok(TradingDecision::hold("No clear signals"))
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StrategyState {
        &mut self.state
    }
}
