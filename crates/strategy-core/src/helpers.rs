//! Shared technical-analysis helpers used by the concrete strategies.

use crate::error::StrategyError;
use crate::types::{MarketData, TechnicalIndicators, TrendDirection};

/// Full MA alignment with positive momentum.
pub fn is_bullish_trend(indicators: &TechnicalIndicators) -> bool {
    indicators.ma20 > indicators.ma50
        && indicators.ma50 > indicators.ma200
        && indicators.macd_histogram > 0.0
}

/// Full MA alignment with negative momentum.
pub fn is_bearish_trend(indicators: &TechnicalIndicators) -> bool {
    indicators.ma20 < indicators.ma50
        && indicators.ma50 < indicators.ma200
        && indicators.macd_histogram < 0.0
}

pub fn is_oversold(indicators: &TechnicalIndicators, threshold: f64) -> bool {
    indicators.rsi < threshold
}

pub fn is_overbought(indicators: &TechnicalIndicators, threshold: f64) -> bool {
    indicators.rsi > threshold
}

/// Classify the MA50/MA200 relationship.
///
/// Bullish (or bearish) only when the gap between the averages exceeds
/// `buffer` as a fraction of MA200; inside the buffer the trend is neutral.
/// Returns the direction together with the relative gap strength.
pub fn trend_direction(ma50: f64, ma200: f64, buffer: f64) -> (TrendDirection, f64) {
    if ma200 <= 0.0 {
        return (TrendDirection::Neutral, 0.0);
    }
    if ma50 > ma200 * (1.0 + buffer) {
        (TrendDirection::Bullish, (ma50 - ma200) / ma200)
    } else if ma50 < ma200 * (1.0 - buffer) {
        (TrendDirection::Bearish, (ma200 - ma50) / ma200)
    } else {
        (TrendDirection::Neutral, 0.0)
    }
}

/// Position size (in units) from fixed-fraction risk sizing.
///
/// Caps the result at 20% of balance worth of units at the entry price.
pub fn risk_position_size(
    balance: f64,
    risk_per_trade: f64,
    entry_price: f64,
    stop_loss: f64,
) -> f64 {
    if stop_loss >= entry_price || entry_price <= 0.0 {
        return 0.0;
    }
    let risk_amount = balance * risk_per_trade;
    let price_risk = entry_price - stop_loss;
    let size = risk_amount / price_risk;
    size.min(balance * 0.2 / entry_price)
}

/// Position size as a capital fraction, interpolated between `min_size` and
/// `max_size` by confidence, scaled down under elevated volatility and
/// bumped for STRONG_BUY signals. Always clamped to [min_size, max_size].
pub fn adaptive_position_size(
    min_size: f64,
    max_size: f64,
    confidence: f64,
    atr_percentage: f64,
    strong: bool,
) -> f64 {
    let mut size = min_size + (max_size - min_size) * confidence;

    let volatility_factor = if atr_percentage > 3.0 {
        0.7
    } else if atr_percentage > 2.0 {
        0.85
    } else {
        1.0
    };

    if strong {
        size *= 1.2;
    }

    (size * volatility_factor).clamp(min_size, max_size)
}

/// ATR-based stop-loss and risk/reward take-profit for a long entry.
pub fn risk_levels(price: f64, atr: f64, stop_multiplier: f64, take_ratio: f64) -> (f64, f64) {
    // Fall back to a 2% estimate when no ATR is available.
    let atr = if atr > 0.0 { atr } else { price * 0.02 };
    let stop_loss = price - atr * stop_multiplier;
    let take_profit = price + atr * stop_multiplier * take_ratio;
    (stop_loss, take_profit)
}

/// Reject snapshots a strategy cannot reason about.
pub fn check_inputs(
    market: &MarketData,
    indicators: &TechnicalIndicators,
) -> Result<(), StrategyError> {
    if !market.price.is_finite() || market.price <= 0.0 {
        return Err(StrategyError::InvalidInput(format!(
            "non-positive or non-finite price for {}: {}",
            market.symbol, market.price
        )));
    }
    let fields = [
        ("rsi", indicators.rsi),
        ("macd_histogram", indicators.macd_histogram),
        ("ma50", indicators.ma50),
        ("ma200", indicators.ma200),
        ("bb_position", indicators.bb_position),
        ("atr_percentage", indicators.atr_percentage),
        ("volume_ratio", indicators.volume_ratio),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(StrategyError::InvalidInput(format!(
                "non-finite indicator {} for {}",
                name, market.symbol
            )));
        }
    }
    Ok(())
}
