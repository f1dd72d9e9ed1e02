use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trading signal ordered by urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingSignal {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl TradingSignal {
    pub fn is_buy(&self) -> bool {
        matches!(self, TradingSignal::Buy | TradingSignal::StrongBuy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, TradingSignal::Sell | TradingSignal::StrongSell)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradingSignal::StrongBuy => "STRONG_BUY",
            TradingSignal::Buy => "BUY",
            TradingSignal::Hold => "HOLD",
            TradingSignal::Sell => "SELL",
            TradingSignal::StrongSell => "STRONG_SELL",
        }
    }
}

/// Volatility bucket derived from ATR as a percentage of price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl VolatilityLevel {
    pub fn from_atr_percentage(atr_percentage: f64) -> Self {
        match atr_percentage {
            p if p < 1.5 => VolatilityLevel::Low,
            p if p < 3.0 => VolatilityLevel::Medium,
            p if p < 5.0 => VolatilityLevel::High,
            _ => VolatilityLevel::Extreme,
        }
    }
}

/// Trend direction from moving-average analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Neutral,
}

/// Risk category of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyCategory {
    Conservative,
    Moderate,
    Aggressive,
}

impl StrategyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyCategory::Conservative => "conservative",
            StrategyCategory::Moderate => "moderate",
            StrategyCategory::Aggressive => "aggressive",
        }
    }
}

/// Market snapshot for one symbol at one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketData {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub timestamp: DateTime<Utc>,
    pub high_24h: f64,
    pub low_24h: f64,
    pub change_24h: f64,
}

/// Pre-computed technical indicators, paired 1:1 with a MarketData sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub ma200: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    /// Price location between the Bollinger bands, 0-100.
    pub bb_position: f64,
    pub atr: f64,
    /// ATR normalized by price, as a percentage.
    pub atr_percentage: f64,
    pub stoch_k: f64,
    pub williams_r: f64,
    /// Current volume relative to its recent average.
    pub volume_ratio: f64,
}

/// AI-summarized news sentiment for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsAnalysis {
    /// -10 (very negative) to +10 (very positive).
    pub sentiment_score: i32,
    pub category: String,
    pub summary: String,
    pub is_critical: bool,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub articles_count: u32,
}

/// A strategy's decision for one symbol at one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingDecision {
    pub signal: TradingSignal,
    /// 0.0 to 1.0.
    pub confidence: f64,
    pub reasoning: String,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    /// Fraction of capital to commit; non-zero only for BUY variants.
    pub position_size: f64,
}

impl TradingDecision {
    /// A zero-confidence HOLD, used when analysis fails internally.
    pub fn hold(reasoning: impl Into<String>) -> Self {
        Self {
            signal: TradingSignal::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
            stop_loss: None,
            take_profit: None,
            position_size: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_classification() {
        assert!(TradingSignal::Buy.is_buy());
        assert!(TradingSignal::StrongBuy.is_buy());
        assert!(!TradingSignal::Hold.is_buy());
        assert!(TradingSignal::Sell.is_sell());
        assert!(TradingSignal::StrongSell.is_sell());
        assert!(!TradingSignal::Buy.is_sell());
    }

    #[test]
    fn signal_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&TradingSignal::StrongBuy).unwrap();
        assert_eq!(json, "\"STRONG_BUY\"");
        let back: TradingSignal = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(back, TradingSignal::Sell);
    }

    #[test]
    fn volatility_buckets() {
        assert_eq!(VolatilityLevel::from_atr_percentage(0.8), VolatilityLevel::Low);
        assert_eq!(VolatilityLevel::from_atr_percentage(2.0), VolatilityLevel::Medium);
        assert_eq!(VolatilityLevel::from_atr_percentage(4.0), VolatilityLevel::High);
        assert_eq!(VolatilityLevel::from_atr_percentage(7.5), VolatilityLevel::Extreme);
    }

    #[test]
    fn hold_decision_is_inert() {
        let d = TradingDecision::hold("no data");
        assert_eq!(d.signal, TradingSignal::Hold);
        assert_eq!(d.confidence, 0.0);
        assert_eq!(d.position_size, 0.0);
        assert!(d.stop_loss.is_none());
        assert!(d.take_profit.is_none());
    }
}
