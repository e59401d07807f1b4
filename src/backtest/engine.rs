use crate::data::{DailyCloseLog, Instrument, PriceBar};
use crate::error::{ConfigError, EngineError};
use crate::portfolio::{Fill, Portfolio, PriceMap, Side};
use crate::strategy::engine::{InOutEngine, SessionContext, SessionDiagnostics, SessionOutcome};
use crate::strategy::execution::{OrderIntent, OrderPlanner};
use crate::utils::Config;
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, info, warn};

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    pub commission_bps: Decimal,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(100_000),
            commission_bps: Decimal::ZERO,
        }
    }
}

/// One trading session worth of daily closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSession {
    pub date: NaiveDate,
    pub bars: Vec<PriceBar>,
}

/// Equity at a session close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: Decimal,
}

/// Replays sessions through the engine and fills submitted plans at the close
pub struct BacktestEngine {
    config: BacktestConfig,
    engine: InOutEngine,
    closes: DailyCloseLog,
    portfolio: Portfolio,
    prices: PriceMap,
    benchmark: Option<Instrument>,
    benchmark_first: Option<Decimal>,

    equity_curve: Vec<EquityPoint>,
    diagnostics: Vec<SessionDiagnostics>,
    orders: Vec<OrderIntent>,
    regime_exits: usize,
}

impl BacktestEngine {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let engine = InOutEngine::new(config)?;
        let closes = DailyCloseLog::new(engine.trailing_lookback());

        Ok(Self {
            config: config.backtest.clone(),
            engine,
            closes,
            portfolio: Portfolio::new(config.backtest.initial_capital),
            prices: PriceMap::new(),
            benchmark: config.universe.benchmark.clone(),
            benchmark_first: None,
            equity_curve: Vec::new(),
            diagnostics: Vec::new(),
            orders: Vec::new(),
            regime_exits: 0,
        })
    }

    /// Replay sessions in order and return the results
    pub fn run(&mut self, sessions: &[TradingSession]) -> Result<BacktestResults, EngineError> {
        for (i, session) in sessions.iter().enumerate() {
            let week_end = match sessions.get(i + 1) {
                Some(next) => next.date.iso_week() != session.date.iso_week(),
                None => true,
            };
            self.process_session(session, week_end)?;

            if (i + 1) % 250 == 0 {
                debug!(sessions = i + 1, "backtest progress");
            }
        }

        Ok(self.get_results())
    }

    /// Feed one session's bars, evaluate it and execute the plan if submitted
    pub fn process_session(&mut self, session: &TradingSession, week_end: bool) -> Result<SessionOutcome, EngineError> {
        for bar in &session.bars {
            self.engine.on_bar(bar);
            self.closes.record(bar);

            match Decimal::from_f64_retain(bar.close).filter(|p| *p > Decimal::ZERO) {
                Some(price) => {
                    self.prices.insert(bar.instrument.clone(), price);
                }
                None => warn!(instrument = %bar.instrument, close = bar.close, "unusable close skipped for pricing"),
            }
        }

        let ctx = SessionContext {
            date: session.date,
            week_end,
            valuation: Some(self.portfolio.valuation(&self.prices)),
        };
        let outcome = self.engine.run_session(&ctx, &self.closes);

        if outcome.regime.exited() {
            self.regime_exits += 1;
        }
        let executed = if outcome.submit { self.execute(&outcome) } else { Ok(()) };

        // The session is recorded even when execution fails
        self.record_equity(session.date);
        self.diagnostics.push(outcome.diagnostics.clone());

        executed.map(|()| outcome)
    }

    fn execute(&mut self, outcome: &SessionOutcome) -> Result<(), EngineError> {
        let intents = OrderPlanner::diff(&outcome.plan, &self.portfolio, &self.prices)?;

        for intent in intents {
            let price = self
                .prices
                .get(&intent.instrument)
                .copied()
                .or_else(|| self.portfolio.holding(&intent.instrument).map(|h| h.average_price))
                .ok_or_else(|| EngineError::MissingPrice(intent.instrument.clone()))?;

            let fill = self.simulate_fill(&intent, price);
            self.portfolio.apply_fill(&fill)?;

            debug!(
                instrument = %fill.instrument,
                side = ?fill.side,
                quantity = %fill.quantity,
                price = %fill.price,
                "filled"
            );
            self.orders.push(intent);
        }

        Ok(())
    }

    /// Fill at the session close with commission
    fn simulate_fill(&self, intent: &OrderIntent, price: Decimal) -> Fill {
        let notional = intent.quantity * price;
        let commission = notional * (self.config.commission_bps / Decimal::from(10_000));

        Fill {
            instrument: intent.instrument.clone(),
            side: intent.side,
            quantity: intent.quantity,
            price,
            commission,
        }
    }

    fn record_equity(&mut self, date: NaiveDate) {
        if self.benchmark_first.is_none() {
            self.benchmark_first = self.benchmark.as_ref().and_then(|b| self.prices.get(b).copied());
        }
        let equity = self.portfolio.total_value(&self.prices);
        self.equity_curve.push(EquityPoint { date, equity });
    }

    fn benchmark_return_pct(&self) -> Option<f64> {
        let first = self.benchmark_first?;
        let last = self.prices.get(self.benchmark.as_ref()?)?;
        if first.is_zero() {
            return None;
        }
        ((*last / first - Decimal::ONE) * Decimal::from(100)).to_f64()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn engine(&self) -> &InOutEngine {
        &self.engine
    }

    /// Get backtest results
    pub fn get_results(&self) -> BacktestResults {
        BacktestResults::new(
            self.config.clone(),
            self.equity_curve.clone(),
            self.diagnostics.clone(),
            self.orders.len(),
            self.regime_exits,
            self.portfolio.total_fees(),
            self.benchmark_return_pct(),
        )
    }
}

/// Backtest results with metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResults {
    pub config: BacktestConfig,
    pub final_equity: Decimal,
    pub total_return: Decimal,
    pub total_return_pct: Decimal,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub sharpe_ratio: f64,
    pub sessions: usize,
    pub sessions_in_market: usize,
    pub regime_exits: usize,
    pub total_orders: usize,
    pub total_fees: Decimal,
    pub benchmark_return_pct: Option<f64>,
    pub equity_curve: Vec<EquityPoint>,
    pub diagnostics: Vec<SessionDiagnostics>,
}

impl BacktestResults {
    pub fn new(
        config: BacktestConfig,
        equity_curve: Vec<EquityPoint>,
        diagnostics: Vec<SessionDiagnostics>,
        total_orders: usize,
        regime_exits: usize,
        total_fees: Decimal,
        benchmark_return_pct: Option<f64>,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map_or(config.initial_capital, |p| p.equity);
        let total_return = final_equity - config.initial_capital;
        let total_return_pct = if config.initial_capital.is_zero() {
            Decimal::ZERO
        } else {
            (total_return / config.initial_capital) * Decimal::from(100)
        };

        let (max_drawdown, max_drawdown_pct) = Self::calculate_max_drawdown(&equity_curve, config.initial_capital);
        let sharpe_ratio = Self::calculate_sharpe_ratio(&equity_curve);
        let sessions_in_market = diagnostics.iter().filter(|d| d.in_market == 1).count();

        Self {
            config,
            final_equity,
            total_return,
            total_return_pct,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            sessions: diagnostics.len(),
            sessions_in_market,
            regime_exits,
            total_orders,
            total_fees,
            benchmark_return_pct,
            equity_curve,
            diagnostics,
        }
    }

    fn calculate_max_drawdown(equity_curve: &[EquityPoint], initial_capital: Decimal) -> (Decimal, Decimal) {
        let mut peak = initial_capital;
        let mut max_dd = Decimal::ZERO;
        let mut max_dd_pct = Decimal::ZERO;

        for point in equity_curve {
            if point.equity > peak {
                peak = point.equity;
            }

            let drawdown = peak - point.equity;
            if drawdown > max_dd {
                max_dd = drawdown;
                if !peak.is_zero() {
                    max_dd_pct = (drawdown / peak) * Decimal::from(100);
                }
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Annualised Sharpe of daily equity returns, zero risk-free rate
    fn calculate_sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
        let equity: Vec<f64> = equity_curve.iter().filter_map(|p| p.equity.to_f64()).collect();
        let returns: Vec<f64> = equity
            .windows(2)
            .filter(|w| w[0] > 0.0)
            .map(|w| w[1] / w[0] - 1.0)
            .collect();

        if returns.len() < 2 {
            return 0.0;
        }

        let mean_return = returns.iter().copied().mean();
        let std_dev = returns.iter().copied().std_dev();

        if !std_dev.is_finite() || std_dev == 0.0 {
            0.0
        } else {
            mean_return / std_dev * 252f64.sqrt()
        }
    }

    /// Print results summary
    pub fn print_summary(&self) {
        let benchmark = self
            .benchmark_return_pct
            .map_or_else(|| "n/a".to_string(), |r| format!("{r:.2}%"));

        println!("\n╔════════════════════════════════════════════════╗");
        println!("║         BACKTEST RESULTS SUMMARY               ║");
        println!("╠════════════════════════════════════════════════╣");
        println!("║ Initial Capital: ${:<28} ║", self.config.initial_capital);
        println!("║ Final Equity: ${:<31} ║", self.final_equity.round_dp(2));
        println!("║ Total Return: ${:<31} ║", self.total_return.round_dp(2));
        println!("║ Return %: {:<35.2}% ║", self.total_return_pct);
        println!("║ Benchmark Return: {:<28} ║", benchmark);
        println!("╠════════════════════════════════════════════════╣");
        println!("║ Sessions: {:<36} ║", self.sessions);
        println!("║ Sessions In Market: {:<26} ║", self.sessions_in_market);
        println!("║ Regime Exits: {:<32} ║", self.regime_exits);
        println!("║ Orders: {:<38} ║", self.total_orders);
        println!("║ Fees: ${:<39} ║", self.total_fees.round_dp(2));
        println!("╠════════════════════════════════════════════════╣");
        println!("║ Max Drawdown: ${:<31} ║", self.max_drawdown.round_dp(2));
        println!("║ Max Drawdown %: {:<29.2}% ║", self.max_drawdown_pct);
        println!("║ Sharpe Ratio: {:<32.2} ║", self.sharpe_ratio);
        println!("╚════════════════════════════════════════════════╝\n");

        info!(
            final_equity = %self.final_equity,
            regime_exits = self.regime_exits,
            orders = self.total_orders,
            "backtest complete"
        );
    }
}
