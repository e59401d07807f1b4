use crate::data::{Instrument, SignalKey};
use crate::strategy::signals::MomentumSnapshot;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Cooldown floor in sessions, and the multiplier applied when a flip fires
pub const INI_WAIT_DAYS: f64 = 15.0;

/// Cap on the cooldown applied in the re-entry rule
pub const MAX_WAIT_DAYS: f64 = 60.0;

/// Risk posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    /// Bull: hold the equity proxy
    In,
    /// Bear: hold the bond proxy
    Out,
}

/// Engine-wide regime state, carried across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeState {
    pub in_market: bool,
    pub last_exit_session: u64,
    pub wait_days: f64,
    pub session_counter: u64,
}

impl RegimeState {
    pub fn initial(ini_wait_days: f64) -> Self {
        Self {
            in_market: true,
            last_exit_session: 0,
            wait_days: ini_wait_days,
            session_counter: 0,
        }
    }

    pub fn regime(&self) -> Regime {
        if self.in_market {
            Regime::In
        } else {
            Regime::Out
        }
    }
}

impl Default for RegimeState {
    fn default() -> Self {
        Self::initial(INI_WAIT_DAYS)
    }
}

/// Reversal rule: strength rotating out of `risky` into `safety`.
///
/// Fires when the safety leg is positive today while the risky leg turned
/// negative after being positive on the prior session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipPair {
    pub tag: String,
    pub safety: Instrument,
    pub risky: Instrument,
}

impl FlipPair {
    pub fn new(tag: &str, safety: &str, risky: &str) -> Self {
        Self {
            tag: tag.to_string(),
            safety: Instrument::new(safety),
            risky: Instrument::new(risky),
        }
    }

    /// Missing values never fire
    pub fn flipped(&self, snapshot: &MomentumSnapshot) -> bool {
        let safety = SignalKey::from(&self.safety);
        let risky = SignalKey::from(&self.risky);
        matches!(
            (
                snapshot.latest(&safety),
                snapshot.latest(&risky),
                snapshot.previous(&risky),
            ),
            (Some(s), Some(r), Some(r_prev)) if s > 0.0 && r < 0.0 && r_prev > 0.0
        )
    }
}

/// The three reversal pairs: gold/silver, utilities/industrials, franc/aussie
pub fn default_flip_pairs() -> Vec<FlipPair> {
    vec![
        FlipPair::new("gold_silver", "GLD", "SLV"),
        FlipPair::new("utilities_industrials", "XLU", "XLI"),
        FlipPair::new("franc_aussie", "FXF", "FXA"),
    ]
}

/// Result of one session's regime evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeUpdate {
    /// Counter value the session was evaluated at
    pub session: u64,
    pub previous: Regime,
    pub current: Regime,
    /// Extreme reading seen this session (exit or exit refresh)
    pub triggered: bool,
    /// Tags of flip rules that fired
    pub flips: Vec<String>,
    pub wait_days: f64,
    /// `min(max_wait_days, wait_days)`, the value used for re-entry
    pub effective_cooldown: f64,
}

impl RegimeUpdate {
    pub fn exited(&self) -> bool {
        self.previous == Regime::In && self.current == Regime::Out
    }

    pub fn entered(&self) -> bool {
        self.previous == Regime::Out && self.current == Regime::In
    }
}

/// Bull/bear state machine with an adaptive re-entry cooldown.
///
/// Any extreme reading forces OUT. Re-entry waits until the session counter
/// has moved `min(max_wait, wait_days)` past the last exit. The cooldown
/// halves each session but never drops below its floor, and a flip rule
/// raises the floor sharply.
pub struct RegimeStateMachine {
    state: RegimeState,
    flip_pairs: Vec<FlipPair>,
    ini_wait_days: f64,
    max_wait_days: f64,
}

impl RegimeStateMachine {
    pub fn new(flip_pairs: Vec<FlipPair>, ini_wait_days: f64, max_wait_days: f64) -> Self {
        Self::with_state(RegimeState::initial(ini_wait_days), flip_pairs, ini_wait_days, max_wait_days)
    }

    /// Resume from a previously captured state
    pub fn with_state(
        state: RegimeState,
        flip_pairs: Vec<FlipPair>,
        ini_wait_days: f64,
        max_wait_days: f64,
    ) -> Self {
        Self {
            state,
            flip_pairs,
            ini_wait_days,
            max_wait_days,
        }
    }

    pub fn state(&self) -> &RegimeState {
        &self.state
    }

    pub fn flip_pairs(&self) -> &[FlipPair] {
        &self.flip_pairs
    }

    /// Evaluate one session's snapshot
    pub fn update(&mut self, snapshot: &MomentumSnapshot) -> RegimeUpdate {
        let flips: Vec<String> = self
            .flip_pairs
            .iter()
            .filter(|p| p.flipped(snapshot))
            .map(|p| p.tag.clone())
            .collect();
        self.step(snapshot.extremes.any(), flips)
    }

    /// Transition given the session's extreme and flip outcomes.
    pub fn step(&mut self, any_extreme: bool, flips: Vec<String>) -> RegimeUpdate {
        let previous = self.state.regime();
        let counter = self.state.session_counter;

        let floor_factor = if flips.is_empty() { 1.0 } else { self.ini_wait_days };
        self.state.wait_days = (0.5 * self.state.wait_days).max(self.ini_wait_days * floor_factor);
        let effective_cooldown = self.state.wait_days.min(self.max_wait_days);

        if any_extreme {
            self.state.in_market = false;
            self.state.last_exit_session = counter;
        } else if !self.state.in_market
            && counter as f64 >= self.state.last_exit_session as f64 + effective_cooldown
        {
            self.state.in_market = true;
        }

        self.state.session_counter += 1;

        let update = RegimeUpdate {
            session: counter,
            previous,
            current: self.state.regime(),
            triggered: any_extreme,
            flips,
            wait_days: self.state.wait_days,
            effective_cooldown,
        };

        if update.exited() {
            info!(session = counter, cooldown = effective_cooldown, "regime OUT: extreme reading");
        } else if update.entered() {
            info!(
                session = counter,
                last_exit = self.state.last_exit_session,
                "regime IN: cooldown elapsed"
            );
        }
        if !update.flips.is_empty() {
            info!(session = counter, flips = ?update.flips, wait_days = update.wait_days, "reversal flip raised cooldown");
        }

        update
    }
}

impl Default for RegimeStateMachine {
    fn default() -> Self {
        Self::new(default_flip_pairs(), INI_WAIT_DAYS, MAX_WAIT_DAYS)
    }
}
