use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An open position in the simulated portfolio.
///
/// Immutable once opened; closing produces a [`ClosedTrade`] instead of
/// mutating exit fields in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedPosition {
    pub symbol: String,
    pub strategy: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
}

impl SimulatedPosition {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.entry_price
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        (current_price - self.entry_price) * self.quantity
    }
}

/// A finalized trade record: the open position plus its close event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
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

impl ClosedTrade {
    pub fn from_position(
        position: &SimulatedPosition,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        exit_reason: &str,
    ) -> Self {
        let pnl = (exit_price - position.entry_price) * position.quantity;
        let cost = position.cost_basis();
        let pnl_percentage = if cost > 0.0 { pnl / cost * 100.0 } else { 0.0 };

        Self {
            symbol: position.symbol.clone(),
            strategy: position.strategy.clone(),
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            entry_time: position.entry_time,
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

/// One sample of the portfolio balance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub total_balance: f64,
    pub cash: f64,
    pub positions_value: f64,
    pub positions_count: usize,
}

/// Aggregate simulation performance, derived purely from recorded history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_balance: f64,
    pub final_balance: f64,
    /// Fractional return on initial balance.
    pub total_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub max_drawdown: f64,
    /// Annualized over per-tick balance returns.
    pub sharpe_ratio: f64,
    pub trades: Vec<ClosedTrade>,
    pub tick_returns: Vec<f64>,
}

/// Snapshot of one open position inside a [`PortfolioStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionStatus {
    pub symbol: String,
    pub strategy: String,
    pub entry_price: f64,
    pub quantity: f64,
    pub current_value: f64,
    pub unrealized_pnl: f64,
    pub entry_time: DateTime<Utc>,
}

/// Point-in-time view of the portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStatus {
    pub timestamp: DateTime<Utc>,
    pub total_balance: f64,
    pub cash: f64,
    pub positions_value: f64,
    pub positions_count: usize,
    pub total_return: f64,
    pub max_drawdown: f64,
    pub active_strategies: Vec<String>,
    pub positions: Vec<PositionStatus>,
}
