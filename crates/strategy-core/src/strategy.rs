use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::StrategyError;
use crate::types::{
    MarketData, NewsAnalysis, StrategyCategory, TechnicalIndicators, TradingDecision,
    TradingSignal,
};

/// An open position in a strategy's own ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPosition {
    pub symbol: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
}

impl OpenPosition {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) * self.quantity
    }
}

/// Running performance totals for one strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub total_trades: u32,
    pub winning_trades: u32,
    /// Cumulative per-trade return percentage.
    pub total_return: f64,
    pub win_rate: f64,
    pub avg_trade_duration_hours: f64,
    pub last_updated: DateTime<Utc>,
}

impl Default for StrategyMetrics {
    fn default() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            total_return: 0.0,
            win_rate: 0.0,
            avg_trade_duration_hours: 0.0,
            last_updated: Utc::now(),
        }
    }
}

impl StrategyMetrics {
    pub fn record_trade(&mut self, trade_return: f64, trade_duration_hours: f64) {
        self.total_trades += 1;
        if trade_return > 0.0 {
            self.winning_trades += 1;
        }
        self.total_return += trade_return;
        self.win_rate = f64::from(self.winning_trades) / f64::from(self.total_trades);

        let n = f64::from(self.total_trades);
        self.avg_trade_duration_hours =
            (self.avg_trade_duration_hours * (n - 1.0) + trade_duration_hours) / n;
        self.last_updated = Utc::now();
    }
}

/// State every strategy carries: the enable flag, validation limits,
/// the position ledger and running metrics.
#[derive(Debug)]
pub struct StrategyState {
    pub enabled: bool,
    pub max_positions: usize,
    pub min_confidence: f64,
    pub positions: HashMap<String, OpenPosition>,
    pub metrics: StrategyMetrics,
}

impl StrategyState {
    pub fn new(max_positions: usize, min_confidence: f64) -> Self {
        Self {
            enabled: true,
            max_positions,
            min_confidence,
            positions: HashMap::new(),
            metrics: StrategyMetrics::default(),
        }
    }
}

/// The contract every trading strategy implements.
///
/// `evaluate` is the fallible core; callers go through the provided
/// `analyze`, which never lets a fault escape: any error becomes a HOLD
/// decision with zero confidence and a diagnostic reasoning string.
pub trait Strategy: Send {
    fn name(&self) -> &str;

    fn category(&self) -> StrategyCategory;

    /// Current parameters as a JSON document, including the strategy name.
    fn parameters(&self) -> serde_json::Value;

    fn evaluate(
        &self,
        symbol: &str,
        market: &MarketData,
        indicators: &TechnicalIndicators,
        news: Option<&NewsAnalysis>,
    ) -> Result<TradingDecision, StrategyError>;

    fn state(&self) -> &StrategyState;

    fn state_mut(&mut self) -> &mut StrategyState;

    /// Evaluate a snapshot; internal faults surface as HOLD / confidence 0.
    fn analyze(
        &self,
        symbol: &str,
        market: &MarketData,
        indicators: &TechnicalIndicators,
        news: Option<&NewsAnalysis>,
    ) -> TradingDecision {
        match self.evaluate(symbol, market, indicators, news) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!("{} analysis failed for {}: {}", self.name(), symbol, e);
                TradingDecision::hold(format!("Analysis error: {}", e))
            }
        }
    }

    /// Risk-management gate for a decision before it is acted on.
    fn validate_signal(&self, decision: &TradingDecision, symbol: &str) -> bool {
        let state = self.state();

        if !state.enabled {
            tracing::debug!("Strategy {} is disabled", self.name());
            return false;
        }

        if decision.signal.is_buy() {
            if state.positions.len() >= state.max_positions {
                tracing::warn!(
                    "Strategy {} has reached max positions ({})",
                    self.name(),
                    state.max_positions
                );
                return false;
            }
            if decision.position_size <= 0.0 || decision.position_size > 1.0 {
                tracing::warn!(
                    "Invalid position size for {}: {}",
                    symbol,
                    decision.position_size
                );
                return false;
            }
        } else if decision.position_size != 0.0 {
            tracing::warn!(
                "Non-buy decision for {} carries position size {}",
                symbol,
                decision.position_size
            );
            return false;
        }

        if decision.confidence < state.min_confidence {
            tracing::debug!(
                "Decision confidence {:.2} below minimum {:.2}",
                decision.confidence,
                state.min_confidence
            );
            return false;
        }

        true
    }

    fn add_position(
        &mut self,
        symbol: &str,
        entry_price: f64,
        quantity: f64,
        entry_time: DateTime<Utc>,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        reasoning: &str,
    ) {
        let position = OpenPosition {
            symbol: symbol.to_string(),
            entry_price,
            quantity,
            entry_time,
            stop_loss,
            take_profit,
            reasoning: reasoning.to_string(),
        };
        self.state_mut().positions.insert(symbol.to_string(), position);
        tracing::info!(
            "{}: added position {} @ {:.4} (qty {:.4})",
            self.name(),
            symbol,
            entry_price,
            quantity
        );
    }

    fn close_position(&mut self, symbol: &str) -> Option<OpenPosition> {
        let position = self.state_mut().positions.remove(symbol);
        if position.is_some() {
            tracing::info!("{}: closed position {}", self.name(), symbol);
        }
        position
    }

    /// Check an open position against its protective levels.
    ///
    /// Returns an immediate full-confidence SELL when the current price has
    /// crossed the stored stop-loss or take-profit.
    fn update_position(&self, symbol: &str, current_price: f64) -> Option<TradingDecision> {
        let position = self.state().positions.get(symbol)?;

        if let Some(stop_loss) = position.stop_loss {
            if current_price <= stop_loss {
                tracing::info!("Stop loss triggered for {} at {}", symbol, current_price);
                return Some(TradingDecision {
                    signal: TradingSignal::Sell,
                    confidence: 1.0,
                    reasoning: format!("Stop loss triggered at {}", current_price),
                    stop_loss: None,
                    take_profit: None,
                    position_size: 0.0,
                });
            }
        }

        if let Some(take_profit) = position.take_profit {
            if current_price >= take_profit {
                tracing::info!("Take profit triggered for {} at {}", symbol, current_price);
                return Some(TradingDecision {
                    signal: TradingSignal::Sell,
                    confidence: 1.0,
                    reasoning: format!("Take profit triggered at {}", current_price),
                    stop_loss: None,
                    take_profit: None,
                    position_size: 0.0,
                });
            }
        }

        None
    }

    /// Fold a completed trade into the running metrics.
    fn update_metrics(&mut self, trade_return: f64, trade_duration_hours: f64) {
        self.state_mut()
            .metrics
            .record_trade(trade_return, trade_duration_hours);
        let metrics = &self.state().metrics;
        tracing::info!(
            "Updated metrics for {}: win rate {:.1}%, total return {:+.2}%",
            self.name(),
            metrics.win_rate * 100.0,
            metrics.total_return
        );
    }

    fn open_positions(&self) -> usize {
        self.state().positions.len()
    }

    /// Mark-to-market value of the ledger at the given prices.
    fn portfolio_value(&self, current_prices: &HashMap<String, f64>) -> f64 {
        self.state()
            .positions
            .values()
            .filter_map(|p| current_prices.get(&p.symbol).map(|price| p.quantity * price))
            .sum()
    }

    fn status_summary(&self) -> serde_json::Value {
        let state = self.state();
        json!({
            "name": self.name(),
            "category": self.category().as_str(),
            "enabled": state.enabled,
            "positions_count": state.positions.len(),
            "max_positions": state.max_positions,
            "metrics": {
                "total_trades": state.metrics.total_trades,
                "win_rate": state.metrics.win_rate,
                "total_return": state.metrics.total_return,
                "avg_trade_duration_hours": state.metrics.avg_trade_duration_hours,
            },
        })
    }
}

/// Shared handle to a strategy instance.
///
/// Strategies carry a mutable ledger, so the registry, simulator and
/// backtester all drive the same instance through a mutex; the lock is what
/// serializes decision application within a tick.
pub type SharedStrategy = Arc<Mutex<Box<dyn Strategy>>>;

/// Lock a shared strategy, recovering from a poisoned mutex.
pub fn lock_strategy(strategy: &SharedStrategy) -> MutexGuard<'_, Box<dyn Strategy>> {
    strategy
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Wrap a boxed strategy into a shared handle.
pub fn share(strategy: Box<dyn Strategy>) -> SharedStrategy {
    Arc::new(Mutex::new(strategy))
}
