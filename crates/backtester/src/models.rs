use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strategy_core::{MarketData, NewsAnalysis, TechnicalIndicators};

/// One stored historical observation: a market sample together with the
/// indicators computed from genuine price history by an upstream
/// technical-analysis collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalSnapshot {
    pub market: MarketData,
    pub indicators: TechnicalIndicators,
    pub news: Option<NewsAnalysis>,
}

impl HistoricalSnapshot {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.market.timestamp
    }
}

/// A trade opened during replay. Closing it produces a [`BacktestTrade`].
#[derive(Debug, Clone)]
pub struct OpenTrade {
    pub symbol: String,
    pub strategy: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl OpenTrade {
    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }
}

/// A finalized replay trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub symbol: String,
    pub strategy: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub pnl_percentage: f64,
    pub exit_reason: String,
}

impl BacktestTrade {
    pub fn from_open(
        trade: &OpenTrade,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        exit_reason: &str,
    ) -> Self {
        let pnl = (exit_price - trade.entry_price) * trade.quantity;
        let cost = trade.entry_price * trade.quantity;
        let pnl_percentage = if cost > 0.0 { pnl / cost * 100.0 } else { 0.0 };

        Self {
            symbol: trade.symbol.clone(),
            strategy: trade.strategy.clone(),
            entry_price: trade.entry_price,
            exit_price,
            quantity: trade.quantity,
            entry_time: trade.entry_time,
            exit_time,
            pnl,
            pnl_percentage,
            exit_reason: exit_reason.to_string(),
        }
    }

    pub fn duration_hours(&self) -> f64 {
        (self.exit_time - self.entry_time).num_seconds() as f64 / 3600.0
    }
}

/// Portfolio equity sampled at one processed timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Per-strategy aggregate of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResults {
    pub strategy: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return: f64,
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_drawdown: f64,
    /// Mean over standard deviation of per-trade return percentages.
    pub sharpe_ratio: f64,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
}
