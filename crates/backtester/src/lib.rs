//! Deterministic historical replay of trading strategies, with an optional
//! parallel parameter sweep.

pub mod engine;
pub mod models;
pub mod sweep;

pub use engine::Backtester;
pub use models::{BacktestResults, BacktestTrade, EquityPoint, HistoricalSnapshot};
pub use sweep::run_parameter_sweep;

#[cfg(test)]
mod tests;
