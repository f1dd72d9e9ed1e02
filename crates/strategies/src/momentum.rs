//! Moderate momentum strategy: MACD momentum plus Bollinger-band position,
//! with volume confirmation, a volatility band gate, a trend filter and a
//! news-sentiment gate.

use serde::{Deserialize, Serialize};
use serde_json::json;

use strategy_core::helpers;
use strategy_core::{
    MarketData, NewsAnalysis, Strategy, StrategyCategory, StrategyError, StrategyState,
    TechnicalIndicators, TradingDecision, TradingSignal, TrendDirection,
};

pub const MODERATE_MOMENTUM: &str = "moderate_momentum";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MomentumConfig {
    // Position sizing
    pub max_position_size: f64,
    pub min_position_size: f64,

    // MACD thresholds: histogram magnitude for a signal, and the higher
    // bound that escalates it to "strong"
    pub macd_threshold: f64,
    pub macd_strong_threshold: f64,

    // Bollinger zones (bb_position percentages)
    pub bb_breakout_threshold: f64,
    pub bb_oversold_threshold: f64,

    // Risk management
    pub stop_loss_atr_multiplier: f64,
    pub take_profit_ratio: f64,

    // Volatility band gate
    pub max_atr_percentage: f64,
    pub min_atr_percentage: f64,

    // Volume confirmation
    pub volume_confirmation_enabled: bool,
    pub min_volume_ratio: f64,
    pub volume_spike_threshold: f64,

    // News sentiment
    pub min_news_sentiment: i32,
    pub critical_news_block: bool,

    // Confidence thresholds
    pub min_confidence_buy: f64,
    pub min_confidence_sell: f64,

    // Trend filter
    pub enable_trend_filter: bool,

    pub max_positions: usize,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            max_position_size: 0.08,
            min_position_size: 0.02,
            macd_threshold: 0.0001,
            macd_strong_threshold: 0.0005,
            bb_breakout_threshold: 80.0,
            bb_oversold_threshold: 20.0,
            stop_loss_atr_multiplier: 1.5,
            take_profit_ratio: 2.5,
            max_atr_percentage: 4.0,
            min_atr_percentage: 0.5,
            volume_confirmation_enabled: true,
            min_volume_ratio: 1.2,
            volume_spike_threshold: 2.0,
            min_news_sentiment: -2,
            critical_news_block: true,
            min_confidence_buy: 0.65,
            min_confidence_sell: 0.60,
            enable_trend_filter: true,
            max_positions: 4,
        }
    }
}

impl MomentumConfig {
    pub fn check(&self) -> Result<(), StrategyError> {
        if self.min_position_size <= 0.0 || self.min_position_size >= self.max_position_size {
            return Err(StrategyError::InvalidConfig(format!(
                "position size bounds invalid: min {} max {}",
                self.min_position_size, self.max_position_size
            )));
        }
        if self.min_atr_percentage >= self.max_atr_percentage {
            return Err(StrategyError::InvalidConfig(
                "min_atr_percentage must be below max_atr_percentage".to_string(),
            ));
        }
        if self.macd_threshold <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "macd_threshold must be positive".to_string(),
            ));
        }
        if self.take_profit_ratio < 1.0 {
            return Err(StrategyError::InvalidConfig(
                "take_profit_ratio below 1.0 gives a negative risk/reward".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_position_size > 0.15 {
            warnings.push("max_position_size above 15%".to_string());
        }
        if self.bb_oversold_threshold >= self.bb_breakout_threshold {
            warnings.push("bb_oversold_threshold >= bb_breakout_threshold".to_string());
        }
        warnings
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MacdMomentum {
    BullishStrong,
    Bullish,
    BearishStrong,
    Bearish,
    Neutral,
}

impl MacdMomentum {
    fn bullish(&self) -> bool {
        matches!(self, MacdMomentum::Bullish | MacdMomentum::BullishStrong)
    }

    fn bearish(&self) -> bool {
        matches!(self, MacdMomentum::Bearish | MacdMomentum::BearishStrong)
    }

    fn label(&self) -> &'static str {
        match self {
            MacdMomentum::BullishStrong => "bullish (strong)",
            MacdMomentum::Bullish => "bullish",
            MacdMomentum::BearishStrong => "bearish (strong)",
            MacdMomentum::Bearish => "bearish",
            MacdMomentum::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BollingerZone {
    Oversold,
    BelowMiddle,
    AboveMiddle,
    Overbought,
    Breakout,
}

impl BollingerZone {
    fn label(&self) -> &'static str {
        match self {
            BollingerZone::Oversold => "oversold",
            BollingerZone::BelowMiddle => "below middle",
            BollingerZone::AboveMiddle => "above middle",
            BollingerZone::Overbought => "overbought",
            BollingerZone::Breakout => "breakout",
        }
    }
}

pub struct ModerateMomentumStrategy {
    config: MomentumConfig,
    state: StrategyState,
}

impl Default for ModerateMomentumStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ModerateMomentumStrategy {
    pub fn new() -> Self {
        Self::build(MomentumConfig::default())
    }

    pub fn with_config(config: MomentumConfig) -> Result<Self, StrategyError> {
        config.check()?;
        Ok(Self::build(config))
    }

    fn build(config: MomentumConfig) -> Self {
        for warning in config.validate() {
            tracing::warn!("[{}] {}", MODERATE_MOMENTUM, warning);
        }
        let state = StrategyState::new(config.max_positions, config.min_confidence_buy);
        tracing::info!("Strategy initialized: {} (moderate)", MODERATE_MOMENTUM);
        Self { config, state }
    }

    /// MACD histogram sign and magnitude, escalated to "strong" when the
    /// magnitude clears the higher bound and agrees with the macd/signal
    /// line ordering.
    fn macd_momentum(&self, indicators: &TechnicalIndicators) -> (MacdMomentum, f64) {
        let hist = indicators.macd_histogram;
        let strength = (hist.abs() / self.config.macd_threshold).min(1.0);

        if hist > self.config.macd_threshold && indicators.macd > indicators.macd_signal {
            if hist >= self.config.macd_strong_threshold {
                (MacdMomentum::BullishStrong, (strength * 1.2).min(1.0))
            } else {
                (MacdMomentum::Bullish, strength)
            }
        } else if hist < -self.config.macd_threshold && indicators.macd < indicators.macd_signal {
            if hist <= -self.config.macd_strong_threshold {
                (MacdMomentum::BearishStrong, (strength * 1.2).min(1.0))
            } else {
                (MacdMomentum::Bearish, strength)
            }
        } else {
            (MacdMomentum::Neutral, 0.3)
        }
    }

    /// Partition bb_position into entry/exit zones with a bounded strength.
    fn bollinger_zone(&self, indicators: &TechnicalIndicators) -> (BollingerZone, f64) {
        let position = indicators.bb_position;

        if position <= self.config.bb_oversold_threshold {
            let strength = (self.config.bb_oversold_threshold - position) / 20.0;
            (BollingerZone::Oversold, strength.min(1.0))
        } else if position >= self.config.bb_breakout_threshold {
            if position >= 95.0 {
                (BollingerZone::Breakout, 0.8)
            } else {
                let strength = (position - self.config.bb_breakout_threshold) / 20.0;
                (BollingerZone::Overbought, strength.min(1.0))
            }
        } else if position < 50.0 {
            (BollingerZone::BelowMiddle, 0.4)
        } else {
            (BollingerZone::AboveMiddle, 0.4)
        }
    }

    fn volume_confirmed(&self, indicators: &TechnicalIndicators) -> bool {
        if !self.config.volume_confirmation_enabled {
            return true;
        }
        if indicators.volume_ratio >= self.config.volume_spike_threshold {
            return true;
        }
        indicators.volume_ratio >= self.config.min_volume_ratio
    }

    fn volatility_in_band(&self, indicators: &TechnicalIndicators) -> bool {
        indicators.atr_percentage >= self.config.min_atr_percentage
            && indicators.atr_percentage <= self.config.max_atr_percentage
    }

    fn trend_filter(&self, indicators: &TechnicalIndicators) -> TrendDirection {
        if !self.config.enable_trend_filter {
            return TrendDirection::Neutral;
        }
        if helpers::is_bullish_trend(indicators) {
            TrendDirection::Bullish
        } else if helpers::is_bearish_trend(indicators) {
            TrendDirection::Bearish
        } else {
            TrendDirection::Neutral
        }
    }

    fn news_ok(&self, news: Option<&NewsAnalysis>) -> bool {
        match news {
            Some(n) => {
                if self.config.critical_news_block && n.is_critical {
                    return false;
                }
                n.sentiment_score >= self.config.min_news_sentiment
            }
            None => true,
        }
    }

    fn position_size(&self, signal: TradingSignal, confidence: f64, atr_percentage: f64) -> f64 {
        if !signal.is_buy() {
            return 0.0;
        }
        helpers::adaptive_position_size(
            self.config.min_position_size,
            self.config.max_position_size,
            confidence,
            atr_percentage,
            signal == TradingSignal::StrongBuy,
        )
    }

    fn stop_loss(&self, price: f64, atr_percentage: f64) -> f64 {
        let atr_estimate = price * (atr_percentage / 100.0);
        let mut stop_distance = atr_estimate * self.config.stop_loss_atr_multiplier;
        // Tighter stop under elevated volatility.
        if atr_percentage > 3.0 {
            stop_distance *= 0.8;
        }
        price - stop_distance
    }

    fn take_profit(&self, price: f64, stop_loss: f64) -> f64 {
        price + (price - stop_loss) * self.config.take_profit_ratio
    }
}

impl Strategy for ModerateMomentumStrategy {
    fn name(&self) -> &str {
        MODERATE_MOMENTUM
    }

    fn category(&self) -> StrategyCategory {
        StrategyCategory::Moderate
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "name": MODERATE_MOMENTUM,
            "type": "momentum",
            "risk_level": "moderate",
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

        let (macd, macd_strength) = self.macd_momentum(indicators);
        let (bb, bb_strength) = self.bollinger_zone(indicators);
        let volume_confirmed = self.volume_confirmed(indicators);
        let volatility_ok = self.volatility_in_band(indicators);
        let trend = self.trend_filter(indicators);
        let news_ok = self.news_ok(news);

        let mut reasons: Vec<String> = Vec::new();
        let base_confidence = 0.5;

        let (mut signal, mut confidence) = if macd == MacdMomentum::BullishStrong
            && bb == BollingerZone::Oversold
            && volume_confirmed
            && volatility_ok
            && trend == TrendDirection::Bullish
            && news_ok
        {
            // Every filter agrees at once.
            reasons.push("Strong MACD + BB oversold".to_string());
            reasons.push("Volume confirmed".to_string());
            reasons.push("Bullish trend".to_string());
            reasons.push("All filters OK".to_string());
            (
                TradingSignal::StrongBuy,
                (0.85 + macd_strength * 0.15).min(0.95),
            )
        } else if macd.bullish()
            && matches!(bb, BollingerZone::Oversold | BollingerZone::BelowMiddle)
            && volatility_ok
            && news_ok
        {
            let mut confidence = base_confidence;
            confidence += macd_strength * 0.3;
            confidence += bb_strength * 0.2;

            if volume_confirmed {
                confidence += 0.1;
                reasons.push("Volume confirmed".to_string());
            }
            if trend == TrendDirection::Bullish {
                confidence += 0.15;
                reasons.push("Bullish trend".to_string());
            }
            if macd == MacdMomentum::BullishStrong {
                confidence += 0.05;
                reasons.push("Strong MACD momentum".to_string());
            }
            reasons.push(format!("MACD {}", macd.label()));
            reasons.push(format!("BB {}", bb.label()));
            reasons.push("Volatility OK".to_string());

            (TradingSignal::Buy, confidence)
        } else if macd.bearish()
            && matches!(bb, BollingerZone::Overbought | BollingerZone::AboveMiddle)
            && volatility_ok
        {
            let mut confidence = base_confidence;
            confidence += macd_strength * 0.25;
            confidence += bb_strength * 0.2;

            if trend == TrendDirection::Bearish {
                confidence += 0.1;
                reasons.push("Bearish trend".to_string());
            }
            if !news_ok {
                confidence += 0.1;
                reasons.push("Negative news".to_string());
            }
            reasons.push(format!("MACD {}", macd.label()));
            reasons.push(format!("BB {}", bb.label()));

            (TradingSignal::Sell, confidence)
        } else if bb == BollingerZone::Breakout
            && macd.bullish()
            && volume_confirmed
            && volatility_ok
            && news_ok
        {
            // Confirmed breakouts enter even against the band-position
            // rule. The volatility band and the news gate still veto.
            reasons.push("BB breakout + MACD bullish".to_string());
            reasons.push("Volume confirmed".to_string());
            (TradingSignal::Buy, 0.75)
        } else {
            if !volatility_ok {
                reasons.push("Volatility outside band".to_string());
            }
            if !news_ok {
                reasons.push("Negative news".to_string());
            }
            if !volume_confirmed && self.config.volume_confirmation_enabled {
                reasons.push("Low volume".to_string());
            }
            if macd == MacdMomentum::Neutral {
                reasons.push("No clear MACD signal".to_string());
            }
            if reasons.is_empty() {
                reasons.push("Mixed signals".to_string());
            }
            (TradingSignal::Hold, 0.3)
        };

        confidence = confidence.clamp(0.0, 1.0);

        // Demote below the action-specific confidence floor.
        if signal.is_buy() && confidence < self.config.min_confidence_buy {
            signal = TradingSignal::Hold;
            reasons.push(format!("Confidence too low ({:.2})", confidence));
        } else if signal == TradingSignal::Sell && confidence < self.config.min_confidence_sell {
            signal = TradingSignal::Hold;
            reasons.push(format!("Confidence too low ({:.2})", confidence));
        }

        let position_size = self.position_size(signal, confidence, indicators.atr_percentage);
        let (stop_loss, take_profit) = if signal.is_buy() {
            let stop = self.stop_loss(market.price, indicators.atr_percentage);
            (Some(stop), Some(self.take_profit(market.price, stop)))
        } else {
            (None, None)
        };

        Ok(TradingDecision {
            signal,
            confidence,
            reasoning: reasons.join(" | "),
            stop_loss,
            take_profit,
            position_size,
        })
    }

    fn state(&self) -> &StrategyState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StrategyState {
        &mut self.state
    }
}
