use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use strategy_core::{
    lock_strategy, MarketData, NewsAnalysis, SharedStrategy, TechnicalIndicators, TradingDecision,
    TradingSignal,
};

use crate::models::{
    BalancePoint, ClosedTrade, PortfolioStatus, PositionStatus, SimulatedPosition,
    SimulationReport,
};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Multi-strategy portfolio simulator.
///
/// Holds the shared cash/position ledger; strategies only produce decisions,
/// the simulator is the single writer that applies them. All event times come
/// from tick timestamps, so a replayed feed produces identical history.
pub struct PortfolioSimulator {
    initial_balance: f64,
    current_balance: f64,
    cash: f64,
    max_positions: usize,
    drawdown_ceiling: f64,

    positions: BTreeMap<(String, String), SimulatedPosition>,
    strategies: BTreeMap<String, SharedStrategy>,
    trade_history: Vec<ClosedTrade>,
    balance_history: Vec<BalancePoint>,

    peak_balance: f64,
    max_drawdown: f64,
    last_prices: HashMap<String, f64>,
}

impl PortfolioSimulator {
    pub fn new(initial_balance: f64, max_positions: usize) -> Self {
        tracing::info!(
            "Portfolio simulator initialized with ${:.2}",
            initial_balance
        );
        Self {
            initial_balance,
            current_balance: initial_balance,
            cash: initial_balance,
            max_positions,
            drawdown_ceiling: 0.15,
            positions: BTreeMap::new(),
            strategies: BTreeMap::new(),
            trade_history: Vec::new(),
            balance_history: Vec::new(),
            peak_balance: initial_balance,
            max_drawdown: 0.0,
            last_prices: HashMap::new(),
        }
    }

    pub fn with_drawdown_ceiling(mut self, ceiling: f64) -> Self {
        self.drawdown_ceiling = ceiling;
        self
    }

    pub fn add_strategy(&mut self, strategy: SharedStrategy) {
        let name = lock_strategy(&strategy).name().to_string();
        tracing::info!("Strategy added: {}", name);
        self.strategies.insert(name, strategy);
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn current_balance(&self) -> f64 {
        self.current_balance
    }

    pub fn open_positions_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trade_history(&self) -> &[ClosedTrade] {
        &self.trade_history
    }

    pub fn balance_history(&self) -> &[BalancePoint] {
        &self.balance_history
    }

    /// Apply one tick for one symbol to the whole portfolio.
    ///
    /// Runs protective exits, then every strategy's decision, then
    /// mark-to-market and the drawdown ceiling.
    pub fn process_tick(
        &mut self,
        symbol: &str,
        market: &MarketData,
        indicators: &TechnicalIndicators,
        news: Option<&NewsAnalysis>,
    ) -> anyhow::Result<()> {
        anyhow::ensure!(
            market.price.is_finite() && market.price > 0.0,
            "invalid tick price for {}: {}",
            symbol,
            market.price
        );

        let price = market.price;
        let now = market.timestamp;
        self.last_prices.insert(symbol.to_string(), price);

        self.check_protective_exits(symbol, price, now);

        let names: Vec<String> = self.strategies.keys().cloned().collect();
        for name in names {
            let strategy = self.strategies[&name].clone();
            let decision = lock_strategy(&strategy).analyze(symbol, market, indicators, news);
            self.apply_decision(symbol, &name, &strategy, decision, price, now);
        }

        self.mark_to_market(now);
        self.apply_risk_management(now);

        Ok(())
    }

    /// Stop-loss and take-profit checks for every open position on a symbol.
    fn check_protective_exits(&mut self, symbol: &str, price: f64, now: DateTime<Utc>) {
        let triggered: Vec<((String, String), &'static str)> = self
            .positions
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .filter_map(|(key, pos)| {
                if pos.stop_loss.is_some_and(|sl| price <= sl) {
                    Some((key.clone(), "Stop-Loss"))
                } else if pos.take_profit.is_some_and(|tp| price >= tp) {
                    Some((key.clone(), "Take-Profit"))
                } else {
                    None
                }
            })
            .collect();

        for (key, reason) in triggered {
            self.close_position(&key, price, now, reason);
        }
    }

    fn apply_decision(
        &mut self,
        symbol: &str,
        strategy_name: &str,
        strategy: &SharedStrategy,
        mut decision: TradingDecision,
        price: f64,
        now: DateTime<Utc>,
    ) {
        if decision.signal.is_sell() {
            let key = (symbol.to_string(), strategy_name.to_string());
            if self.positions.contains_key(&key) {
                self.close_position(&key, price, now, "Strategy Signal");
            }
            return;
        }

        if !decision.signal.is_buy() {
            return;
        }

        // Strong signals commit more capital, hard-capped at 10%.
        if decision.signal == TradingSignal::StrongBuy {
            decision.position_size = (decision.position_size * 1.5).min(0.10);
        }

        if !lock_strategy(strategy).validate_signal(&decision, symbol) {
            return;
        }

        self.open_position(symbol, strategy_name, strategy, &decision, price, now);
    }

    fn open_position(
        &mut self,
        symbol: &str,
        strategy_name: &str,
        strategy: &SharedStrategy,
        decision: &TradingDecision,
        price: f64,
        now: DateTime<Utc>,
    ) {
        let key = (symbol.to_string(), strategy_name.to_string());
        if self.positions.contains_key(&key) {
            tracing::debug!(
                "Position already exists for {} with {}",
                symbol,
                strategy_name
            );
            return;
        }

        if self.positions.len() >= self.max_positions {
            tracing::warn!("Max positions ({}) reached", self.max_positions);
            return;
        }

        let position_value = self.current_balance * decision.position_size;
        if position_value > self.cash {
            tracing::warn!(
                "Insufficient cash for position: ${:.2} > ${:.2}",
                position_value,
                self.cash
            );
            return;
        }

        let quantity = position_value / price;
        let position = SimulatedPosition {
            symbol: symbol.to_string(),
            strategy: strategy_name.to_string(),
            entry_price: price,
            quantity,
            entry_time: now,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
            reasoning: decision.reasoning.clone(),
        };

        self.cash -= position_value;
        self.positions.insert(key, position);

        lock_strategy(strategy).add_position(
            symbol,
            price,
            quantity,
            now,
            decision.stop_loss,
            decision.take_profit,
            &decision.reasoning,
        );

        tracing::info!(
            "Opened position: {} @ ${:.2} (${:.2}) [{}]",
            symbol,
            price,
            position_value,
            strategy_name
        );
    }

    fn close_position(
        &mut self,
        key: &(String, String),
        exit_price: f64,
        now: DateTime<Utc>,
        reason: &str,
    ) {
        let Some(position) = self.positions.remove(key) else {
            return;
        };

        self.cash += position.market_value(exit_price);
        let trade = ClosedTrade::from_position(&position, exit_price, now, reason);

        if let Some(strategy) = self.strategies.get(&key.1) {
            let mut guard = lock_strategy(strategy);
            guard.close_position(&key.0);
            guard.update_metrics(trade.pnl_percentage, trade.duration_hours());
        }

        tracing::info!(
            "Closed position: {} @ ${:.2} PnL: ${:+.2} ({})",
            trade.symbol,
            exit_price,
            trade.pnl,
            reason
        );
        self.trade_history.push(trade);
    }

    fn positions_value(&self) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = self
                    .last_prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    fn mark_to_market(&mut self, now: DateTime<Utc>) {
        let positions_value = self.positions_value();
        self.current_balance = self.cash + positions_value;

        if self.current_balance > self.peak_balance {
            self.peak_balance = self.current_balance;
        }
        let drawdown = (self.peak_balance - self.current_balance) / self.peak_balance;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }

        self.balance_history.push(BalancePoint {
            timestamp: now,
            total_balance: self.current_balance,
            cash: self.cash,
            positions_value,
            positions_count: self.positions.len(),
        });
    }

    /// Force-liquidate everything when the current drawdown breaches the
    /// ceiling. Positions close at the last known market price.
    fn apply_risk_management(&mut self, now: DateTime<Utc>) {
        let drawdown = (self.peak_balance - self.current_balance) / self.peak_balance;
        if drawdown <= self.drawdown_ceiling || self.positions.is_empty() {
            return;
        }

        tracing::warn!(
            "Drawdown ceiling exceeded ({:.1}%), liquidating {} positions",
            drawdown * 100.0,
            self.positions.len()
        );

        let keys: Vec<(String, String)> = self.positions.keys().cloned().collect();
        for key in keys {
            let exit_price = self
                .positions
                .get(&key)
                .map(|pos| {
                    self.last_prices
                        .get(&pos.symbol)
                        .copied()
                        .unwrap_or(pos.entry_price)
                })
                .unwrap_or_default();
            self.close_position(&key, exit_price, now, "Risk Management");
        }

        self.current_balance = self.cash;
    }

    /// Aggregate performance, derived purely from recorded history.
    /// Repeated calls with no intervening ticks return identical reports.
    pub fn performance_summary(&self) -> SimulationReport {
        let total_trades = self.trade_history.len();
        let winning_trades = self.trade_history.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = self.trade_history.iter().filter(|t| t.pnl < 0.0).count();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64
        } else {
            0.0
        };

        let tick_returns = self.tick_returns();
        let sharpe_ratio = annualized_sharpe(&tick_returns);

        let start_date = self
            .balance_history
            .first()
            .map(|b| b.timestamp)
            .unwrap_or_else(Utc::now);
        let end_date = self
            .balance_history
            .last()
            .map(|b| b.timestamp)
            .unwrap_or(start_date);

        SimulationReport {
            start_date,
            end_date,
            initial_balance: self.initial_balance,
            final_balance: self.current_balance,
            total_return: (self.current_balance - self.initial_balance) / self.initial_balance,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            max_drawdown: self.max_drawdown,
            sharpe_ratio,
            trades: self.trade_history.clone(),
            tick_returns,
        }
    }

    pub fn current_status(&self) -> PortfolioStatus {
        let positions_value = self.positions_value();
        let positions = self
            .positions
            .values()
            .map(|pos| {
                let price = self
                    .last_prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.entry_price);
                PositionStatus {
                    symbol: pos.symbol.clone(),
                    strategy: pos.strategy.clone(),
                    entry_price: pos.entry_price,
                    quantity: pos.quantity,
                    current_value: pos.market_value(price),
                    unrealized_pnl: pos.unrealized_pnl(price),
                    entry_time: pos.entry_time,
                }
            })
            .collect();

        PortfolioStatus {
            timestamp: self
                .balance_history
                .last()
                .map(|b| b.timestamp)
                .unwrap_or_else(Utc::now),
            total_balance: self.current_balance,
            cash: self.cash,
            positions_value,
            positions_count: self.positions.len(),
            total_return: (self.current_balance - self.initial_balance) / self.initial_balance,
            max_drawdown: self.max_drawdown,
            active_strategies: self.strategies.keys().cloned().collect(),
            positions,
        }
    }

    fn tick_returns(&self) -> Vec<f64> {
        self.balance_history
            .windows(2)
            .map(|w| (w[1].total_balance - w[0].total_balance) / w[0].total_balance)
            .collect()
    }
}

/// Mean over standard deviation of per-tick returns, annualized to 252
/// trading days.
fn annualized_sharpe(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().copied().mean();
    let std_dev = returns.iter().copied().std_dev();
    if !std_dev.is_finite() || std_dev == 0.0 {
        return 0.0;
    }
    (mean * TRADING_DAYS_PER_YEAR) / (std_dev * TRADING_DAYS_PER_YEAR.sqrt())
}
