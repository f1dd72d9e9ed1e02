use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use strategy_core::{lock_strategy, SharedStrategy, TradingDecision};

use crate::models::{BacktestResults, BacktestTrade, EquityPoint, HistoricalSnapshot, OpenTrade};

/// Fraction of free capital a single entry may draw on.
const CAPITAL_USAGE: f64 = 0.8;

/// Deterministic historical replay engine.
///
/// Replays stored snapshots strictly in timestamp order and applies the same
/// exit-then-entry sequence as the live simulator, long-only: sell signals
/// close positions, never short.
pub struct Backtester {
    initial_capital: f64,
    capital: f64,
    strategies: BTreeMap<String, SharedStrategy>,
    open_trades: BTreeMap<(String, String), OpenTrade>,
    closed_trades: Vec<BacktestTrade>,
    equity_curve: Vec<EquityPoint>,
    last_prices: HashMap<String, f64>,
}

impl Backtester {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            capital: initial_capital,
            strategies: BTreeMap::new(),
            open_trades: BTreeMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            last_prices: HashMap::new(),
        }
    }

    pub fn add_strategy(&mut self, strategy: SharedStrategy) {
        let name = lock_strategy(&strategy).name().to_string();
        tracing::info!("Backtest strategy added: {}", name);
        self.strategies.insert(name, strategy);
    }

    pub fn final_capital(&self) -> f64 {
        self.capital
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Replay all snapshots within [start, end] and aggregate results per
    /// strategy.
    pub fn run(
        &mut self,
        data: &HashMap<String, Vec<HistoricalSnapshot>>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<BTreeMap<String, BacktestResults>> {
        anyhow::ensure!(!self.strategies.is_empty(), "no strategies added");
        self.reset();

        // Sorted union of all timestamps in range; sorted symbols within
        // each timestamp. Replay order is fully deterministic.
        let mut indexed: BTreeMap<&str, BTreeMap<DateTime<Utc>, &HistoricalSnapshot>> =
            BTreeMap::new();
        let mut timestamps: BTreeSet<DateTime<Utc>> = BTreeSet::new();
        for (symbol, snapshots) in data {
            let by_time = indexed.entry(symbol.as_str()).or_default();
            for snap in snapshots {
                let ts = snap.timestamp();
                if ts >= start && ts <= end {
                    timestamps.insert(ts);
                    by_time.insert(ts, snap);
                }
            }
        }
        anyhow::ensure!(
            !timestamps.is_empty(),
            "no historical snapshots within [{}, {}]",
            start,
            end
        );

        tracing::info!(
            "Backtest: {} timestamps across {} symbols, ${:.2} capital",
            timestamps.len(),
            indexed.len(),
            self.initial_capital
        );

        for &ts in &timestamps {
            for by_time in indexed.values() {
                if let Some(snap) = by_time.get(&ts) {
                    self.process_snapshot(snap);
                }
            }
            self.sample_equity(ts);
        }

        let last_ts = *timestamps.iter().next_back().unwrap();
        self.close_remaining(last_ts);

        Ok(self.aggregate())
    }

    fn reset(&mut self) {
        self.capital = self.initial_capital;
        self.open_trades.clear();
        self.closed_trades.clear();
        self.equity_curve.clear();
        self.last_prices.clear();
    }

    /// Exit checks, then entry checks, for one symbol at one timestamp.
    fn process_snapshot(&mut self, snap: &HistoricalSnapshot) {
        let symbol = snap.market.symbol.as_str();
        let price = snap.market.price;
        let ts = snap.market.timestamp;
        self.last_prices.insert(symbol.to_string(), price);

        let triggered: Vec<((String, String), &'static str)> = self
            .open_trades
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .filter_map(|(key, trade)| {
                if trade.stop_loss.is_some_and(|sl| price <= sl) {
                    Some((key.clone(), "Stop-Loss"))
                } else if trade.take_profit.is_some_and(|tp| price >= tp) {
                    Some((key.clone(), "Take-Profit"))
                } else {
                    None
                }
            })
            .collect();
        for (key, reason) in triggered {
            self.close_trade(&key, price, ts, reason);
        }

        let names: Vec<String> = self.strategies.keys().cloned().collect();
        for name in names {
            let strategy = self.strategies[&name].clone();
            let decision = lock_strategy(&strategy).analyze(
                symbol,
                &snap.market,
                &snap.indicators,
                snap.news.as_ref(),
            );

            let key = (symbol.to_string(), name.clone());
            if self.open_trades.contains_key(&key) {
                // Long-only: a sell closes, never shorts.
                if decision.signal.is_sell() {
                    self.close_trade(&key, price, ts, "Strategy Signal");
                }
            } else if decision.signal.is_buy()
                && lock_strategy(&strategy).validate_signal(&decision, symbol)
            {
                self.open_trade(symbol, &name, &strategy, &decision, price, ts);
            }
        }
    }

    fn open_trade(
        &mut self,
        symbol: &str,
        strategy_name: &str,
        strategy: &SharedStrategy,
        decision: &TradingDecision,
        price: f64,
        ts: DateTime<Utc>,
    ) {
        let position_value = self.capital * CAPITAL_USAGE * decision.position_size;
        if position_value <= 0.0 || position_value > self.capital {
            tracing::warn!(
                "Rejected entry for {}: value ${:.2} vs capital ${:.2}",
                symbol,
                position_value,
                self.capital
            );
            return;
        }

        let quantity = position_value / price;
        self.capital -= position_value;
        self.open_trades.insert(
            (symbol.to_string(), strategy_name.to_string()),
            OpenTrade {
                symbol: symbol.to_string(),
                strategy: strategy_name.to_string(),
                entry_price: price,
                quantity,
                entry_time: ts,
                stop_loss: decision.stop_loss,
                take_profit: decision.take_profit,
            },
        );

        lock_strategy(strategy).add_position(
            symbol,
            price,
            quantity,
            ts,
            decision.stop_loss,
            decision.take_profit,
            &decision.reasoning,
        );

        tracing::debug!(
            "Opened {} @ {:.4} (${:.2}) [{}]",
            symbol,
            price,
            position_value,
            strategy_name
        );
    }

    fn close_trade(
        &mut self,
        key: &(String, String),
        exit_price: f64,
        ts: DateTime<Utc>,
        reason: &str,
    ) {
        let Some(open) = self.open_trades.remove(key) else {
            return;
        };

        self.capital += open.market_value(exit_price);
        let trade = BacktestTrade::from_open(&open, exit_price, ts, reason);

        if let Some(strategy) = self.strategies.get(&key.1) {
            let mut guard = lock_strategy(strategy);
            guard.close_position(&key.0);
            guard.update_metrics(trade.pnl_percentage, trade.duration_hours());
        }

        tracing::debug!(
            "Closed {} @ {:.4} PnL {:+.2} ({})",
            trade.symbol,
            exit_price,
            trade.pnl,
            reason
        );
        self.closed_trades.push(trade);
    }

    /// Force-close everything still open at the last available prices.
    fn close_remaining(&mut self, ts: DateTime<Utc>) {
        let keys: Vec<(String, String)> = self.open_trades.keys().cloned().collect();
        for key in keys {
            let exit_price = self
                .open_trades
                .get(&key)
                .map(|t| self.last_prices.get(&t.symbol).copied().unwrap_or(t.entry_price))
                .unwrap_or_default();
            self.close_trade(&key, exit_price, ts, "Backtest End");
        }
    }

    fn sample_equity(&mut self, ts: DateTime<Utc>) {
        let open_value: f64 = self
            .open_trades
            .values()
            .map(|t| {
                let price = self
                    .last_prices
                    .get(&t.symbol)
                    .copied()
                    .unwrap_or(t.entry_price);
                t.market_value(price)
            })
            .sum();
        self.equity_curve.push(EquityPoint {
            timestamp: ts,
            equity: self.capital + open_value,
        });
    }

    fn aggregate(&self) -> BTreeMap<String, BacktestResults> {
        let max_drawdown = max_drawdown(&self.equity_curve);

        self.strategies
            .keys()
            .map(|name| {
                let trades: Vec<BacktestTrade> = self
                    .closed_trades
                    .iter()
                    .filter(|t| &t.strategy == name)
                    .cloned()
                    .collect();

                let wins: Vec<f64> = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect();
                let losses: Vec<f64> =
                    trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).collect();
                let total_return: f64 = trades.iter().map(|t| t.pnl).sum();
                let returns_pct: Vec<f64> = trades.iter().map(|t| t.pnl_percentage).collect();

                let results = BacktestResults {
                    strategy: name.clone(),
                    initial_capital: self.initial_capital,
                    final_capital: self.initial_capital + total_return,
                    total_return,
                    total_return_pct: total_return / self.initial_capital * 100.0,
                    total_trades: trades.len(),
                    winning_trades: wins.len(),
                    losing_trades: losses.len(),
                    win_rate: if trades.is_empty() {
                        0.0
                    } else {
                        wins.len() as f64 / trades.len() as f64
                    },
                    avg_win: if wins.is_empty() {
                        0.0
                    } else {
                        wins.iter().sum::<f64>() / wins.len() as f64
                    },
                    avg_loss: if losses.is_empty() {
                        0.0
                    } else {
                        losses.iter().sum::<f64>() / losses.len() as f64
                    },
                    max_drawdown,
                    sharpe_ratio: sharpe_ratio(&returns_pct),
                    trades,
                    equity_curve: self.equity_curve.clone(),
                };
                (name.clone(), results)
            })
            .collect()
    }
}

/// Largest fractional peak-to-trough decline of the equity curve.
fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            worst = worst.max((peak - point.equity) / peak);
        }
    }
    worst
}

/// Mean over standard deviation of per-trade return percentages.
fn sharpe_ratio(returns_pct: &[f64]) -> f64 {
    if returns_pct.len() < 2 {
        return 0.0;
    }
    let mean = returns_pct.iter().copied().mean();
    let std_dev = returns_pct.iter().copied().std_dev();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }
    mean / std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_of_monotone_curve_is_zero() {
        let base = Utc::now();
        let curve: Vec<EquityPoint> = [100.0, 110.0, 125.0]
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: base + chrono::Duration::hours(i as i64),
                equity,
            })
            .collect();
        assert_eq!(max_drawdown(&curve), 0.0);
    }

    #[test]
    fn drawdown_measures_worst_decline() {
        let base = Utc::now();
        let curve: Vec<EquityPoint> = [100.0, 120.0, 90.0, 130.0, 117.0]
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: base + chrono::Duration::hours(i as i64),
                equity,
            })
            .collect();
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn sharpe_needs_dispersion() {
        assert_eq!(sharpe_ratio(&[]), 0.0);
        assert_eq!(sharpe_ratio(&[1.0]), 0.0);
        assert_eq!(sharpe_ratio(&[2.0, 2.0, 2.0]), 0.0);
        assert!(sharpe_ratio(&[1.0, 3.0, 2.0]) > 0.0);
        assert!(sharpe_ratio(&[-1.0, -3.0, -2.0]) < 0.0);
    }
}
