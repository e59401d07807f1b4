use crate::data::{AppendOutcome, Instrument, PriceBar, PriceHistoryStore, SignalKey, WeightPlan};
use crate::error::ConfigError;
use crate::portfolio::PortfolioValuation;
use crate::strategy::rebalance::{InMarketCadence, RebalancePlanner};
use crate::strategy::regime::{RegimeState, RegimeStateMachine, RegimeUpdate};
use crate::strategy::selection::{AssetSelector, SelectionState, SelectionUpdate, TrailingHistory};
use crate::strategy::signals::{MomentumSignalEngine, MomentumSnapshot};
use crate::utils::Config;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the host knows about the session being evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub date: NaiveDate,
    /// Last trading session of the week
    pub week_end: bool,
    /// Current portfolio valuation, when the host tracks one
    pub valuation: Option<PortfolioValuation>,
}

impl SessionContext {
    pub fn new(date: NaiveDate, week_end: bool) -> Self {
        Self {
            date,
            week_end,
            valuation: None,
        }
    }
}

/// Per-session scalars for observability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    pub session: u64,
    pub date: NaiveDate,
    pub in_market: u8,
    pub extreme_count: usize,
    pub extreme_keys: Vec<SignalKey>,
    pub effective_cooldown: f64,
    pub leverage: Option<f64>,
    pub benchmark_equity: Option<f64>,
}

/// Everything one session produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub plan: WeightPlan,
    /// Whether the plan should be handed to execution this session
    pub submit: bool,
    pub regime: RegimeUpdate,
    pub selection: SelectionUpdate,
    pub diagnostics: SessionDiagnostics,
}

/// Session pipeline: history → momentum snapshot → regime → selection → plan.
///
/// Bars may be pushed at any time through [`InOutEngine::on_bar`]; the rest
/// of the pipeline runs only from [`InOutEngine::run_session`], once per
/// session.
pub struct InOutEngine {
    history: PriceHistoryStore,
    signals: MomentumSignalEngine,
    regime: RegimeStateMachine,
    selector: AssetSelector,
    cadence: InMarketCadence,
    warmup_sessions: u64,
    benchmark: Option<Instrument>,
    benchmark_start: Option<f64>,
    capital: f64,
    last_snapshot: Option<MomentumSnapshot>,
}

impl InOutEngine {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let capital = config.backtest.initial_capital.to_f64().unwrap_or(0.0);

        Ok(Self {
            history: PriceHistoryStore::new(config.signal.lookback, config.signal.baseline()),
            signals: MomentumSignalEngine::new(config.universe.signal_universe(), config.signal.percentile),
            regime: RegimeStateMachine::new(
                config.universe.flip_pairs.clone(),
                config.regime.ini_wait_days,
                config.regime.max_wait_days,
            ),
            selector: AssetSelector::new(
                config.universe.bond_pair.clone(),
                config.universe.equity_pair.clone(),
                config.selection.momentum_window,
                config.selection.excluded_sessions,
            ),
            cadence: config.rebalance.in_market_cadence,
            warmup_sessions: config.rebalance.warmup_sessions,
            benchmark: config.universe.benchmark.clone(),
            benchmark_start: None,
            capital,
            last_snapshot: None,
        })
    }

    /// Feed a bar into the price history; no signal work happens here
    pub fn on_bar(&mut self, bar: &PriceBar) -> AppendOutcome {
        self.history.apply(bar)
    }

    /// Run the full pipeline for one session
    pub fn run_session<H: TrailingHistory + ?Sized>(&mut self, ctx: &SessionContext, trailing: &H) -> SessionOutcome {
        let session = self.regime.state().session_counter;

        let snapshot = self.signals.compute_snapshot_at(&self.history, session, ctx.date);
        let regime = self.regime.update(&snapshot);
        let selection = self.selector.refresh(trailing);
        let plan = RebalancePlanner::plan(self.regime.state(), self.selector.state());

        let warming_up = session < self.warmup_sessions;
        let submit = !warming_up && self.cadence.should_submit(regime.current, ctx.week_end);

        let diagnostics = SessionDiagnostics {
            session,
            date: ctx.date,
            in_market: u8::from(self.regime.state().in_market),
            extreme_count: snapshot.extreme_count(),
            extreme_keys: snapshot.extremes.extreme_keys(),
            effective_cooldown: regime.effective_cooldown,
            leverage: ctx.valuation.and_then(|v| v.leverage()),
            benchmark_equity: self.benchmark_equity(),
        };

        debug!(
            session,
            date = %ctx.date,
            in_market = diagnostics.in_market,
            extremes = diagnostics.extreme_count,
            cooldown = diagnostics.effective_cooldown,
            submit,
            "session evaluated"
        );

        self.last_snapshot = Some(snapshot);

        SessionOutcome {
            plan,
            submit,
            regime,
            selection,
            diagnostics,
        }
    }

    /// Benchmark close normalised to the initial capital
    fn benchmark_equity(&mut self) -> Option<f64> {
        let close = self.history.latest_close(self.benchmark.as_ref()?)?;
        let start = *self.benchmark_start.get_or_insert(close);
        if start > 0.0 {
            Some(close / start * self.capital)
        } else {
            None
        }
    }

    /// Current target weights without advancing a session
    pub fn current_plan(&self) -> WeightPlan {
        RebalancePlanner::plan(self.regime.state(), self.selector.state())
    }

    pub fn history(&self) -> &PriceHistoryStore {
        &self.history
    }

    pub fn regime_state(&self) -> &RegimeState {
        self.regime.state()
    }

    pub fn selection_state(&self) -> &SelectionState {
        self.selector.state()
    }

    pub fn last_snapshot(&self) -> Option<&MomentumSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Closes per instrument the host should return for trailing history
    pub fn trailing_lookback(&self) -> usize {
        self.selector.lookback_sessions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DailyCloseLog;
    use crate::strategy::regime::Regime;
    use chrono::{Datelike, Duration};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap() + Duration::days(n)
    }

    /// Flat market; SLV drops 30% from `collapse_at` onward
    fn run_flat_market(engine: &mut InOutEngine, config: &Config, sessions: i64, collapse_at: i64) -> Vec<SessionOutcome> {
        let mut log = DailyCloseLog::new(engine.trailing_lookback());
        let instruments = config.universe.all_instruments();
        let mut outcomes = Vec::new();

        for n in 0..sessions {
            for instrument in &instruments {
                let close = if instrument.symbol() == "SLV" && n >= collapse_at { 70.0 } else { 100.0 };
                let bar = PriceBar::new(instrument.clone(), day(n), close);
                engine.on_bar(&bar);
                log.record(&bar);
            }
            let ctx = SessionContext::new(day(n), day(n).weekday() == chrono::Weekday::Fri);
            outcomes.push(engine.run_session(&ctx, &log));
        }
        outcomes
    }

    #[test]
    fn test_spread_collapse_scenario() {
        let config = Config::default();
        let mut engine = InOutEngine::new(&config).unwrap();
        let outcomes = run_flat_market(&mut engine, &config, 300, 200);

        for outcome in &outcomes[..200] {
            assert_eq!(outcome.diagnostics.in_market, 1, "session {}", outcome.diagnostics.session);
        }

        let exit = &outcomes[200];
        assert!(exit.regime.exited());
        assert!(exit.diagnostics.extreme_keys.contains(&SignalKey::new("S_G")));
        assert!(exit.submit);
        assert_eq!(exit.plan.weight(&Instrument::new("TLT")), Some(1.0));

        // Held out for at least INI_WAIT_DAYS sessions after the exit
        for outcome in &outcomes[200..215] {
            assert_eq!(outcome.regime.current, Regime::Out, "session {}", outcome.diagnostics.session);
        }

        let reentry = outcomes
            .iter()
            .skip(200)
            .find(|o| o.regime.entered())
            .map(|o| o.diagnostics.session)
            .unwrap();
        let last_exit = engine.regime_state().last_exit_session;
        assert!(reentry >= last_exit + 15);
        assert!(engine.regime_state().in_market);
    }

    #[test]
    fn test_early_next_session_bar_keeps_exit() {
        let config = Config::default();
        let mut engine = InOutEngine::new(&config).unwrap();
        let mut log = DailyCloseLog::new(engine.trailing_lookback());
        run_flat_market(&mut engine, &config, 150, i64::MAX);

        for instrument in config.universe.all_instruments() {
            let close = if instrument.symbol() == "SLV" { 70.0 } else { 100.0 };
            let bar = PriceBar::new(instrument, day(150), close);
            engine.on_bar(&bar);
            log.record(&bar);
        }
        // Partial bar for the following session arrives before evaluation
        engine.on_bar(&PriceBar::new(Instrument::new("QQQ"), day(151), 101.0));

        let outcome = engine.run_session(&SessionContext::new(day(150), false), &log);
        assert!(outcome.regime.exited());
        assert_eq!(outcome.diagnostics.extreme_keys, vec![SignalKey::new("S_G")]);
        assert_eq!(outcome.diagnostics.in_market, 0);
    }

    #[test]
    fn test_flat_market_stays_in() {
        let config = Config::default();
        let mut engine = InOutEngine::new(&config).unwrap();
        let outcomes = run_flat_market(&mut engine, &config, 150, i64::MAX);

        assert!(outcomes.iter().all(|o| o.diagnostics.in_market == 1));
        assert!(outcomes.iter().all(|o| o.diagnostics.extreme_count == 0));
        assert_eq!(engine.regime_state().session_counter, 150);
        // Ties everywhere: selection never moves
        assert_eq!(engine.selection_state().equity_choice, Instrument::new("QQQ"));
        assert_eq!(engine.selection_state().bond_choice, Instrument::new("TLT"));
    }

    #[test]
    fn test_in_market_submits_on_week_end_only() {
        let config = Config::default();
        let mut engine = InOutEngine::new(&config).unwrap();
        let outcomes = run_flat_market(&mut engine, &config, 20, i64::MAX);

        for outcome in &outcomes {
            let friday = outcome.diagnostics.date.weekday() == chrono::Weekday::Fri;
            assert_eq!(outcome.submit, friday);
        }
    }

    #[test]
    fn test_warmup_suppresses_submission() {
        let mut config = Config::default();
        config.rebalance.warmup_sessions = 10;
        config.rebalance.in_market_cadence = InMarketCadence::Daily;
        let mut engine = InOutEngine::new(&config).unwrap();
        let outcomes = run_flat_market(&mut engine, &config, 12, i64::MAX);

        assert!(outcomes[..10].iter().all(|o| !o.submit));
        assert!(outcomes[10..].iter().all(|o| o.submit));
    }

    #[test]
    fn test_empty_history_session_is_safe() {
        let config = Config::default();
        let mut engine = InOutEngine::new(&config).unwrap();
        let log = DailyCloseLog::new(10);
        let outcome = engine.run_session(&SessionContext::new(day(0), false), &log);

        assert_eq!(outcome.diagnostics.in_market, 1);
        assert_eq!(outcome.diagnostics.benchmark_equity, None);
        assert_eq!(outcome.plan, engine.current_plan());
    }

    #[test]
    fn test_benchmark_equity_normalised() {
        let config = Config::default();
        let mut engine = InOutEngine::new(&config).unwrap();
        let log = DailyCloseLog::new(10);
        let spy = Instrument::new("SPY");

        engine.on_bar(&PriceBar::new(spy.clone(), day(0), 400.0));
        let first = engine.run_session(&SessionContext::new(day(0), false), &log);
        engine.on_bar(&PriceBar::new(spy, day(1), 440.0));
        let second = engine.run_session(&SessionContext::new(day(1), false), &log);

        assert!((first.diagnostics.benchmark_equity.unwrap() - 100_000.0).abs() < 1e-6);
        assert!((second.diagnostics.benchmark_equity.unwrap() - 110_000.0).abs() < 1e-6);
    }
}
