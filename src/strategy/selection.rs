use crate::data::Instrument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Sessions covered by the trailing return
pub const DEFAULT_MOMENTUM_WINDOW: usize = 126;

/// Most recent sessions left out of the trailing return
pub const DEFAULT_EXCLUDED_SESSIONS: usize = 5;

/// Source of on-demand trailing daily closes, supplied by the host.
pub trait TrailingHistory {
    /// Up to `sessions` most recent closes, oldest first
    fn trailing_closes(&self, instrument: &Instrument, sessions: usize) -> Option<Vec<f64>>;
}

impl TrailingHistory for HashMap<Instrument, Vec<f64>> {
    fn trailing_closes(&self, instrument: &Instrument, sessions: usize) -> Option<Vec<f64>> {
        let closes = self.get(instrument)?;
        let skip = closes.len().saturating_sub(sessions);
        Some(closes[skip..].to_vec())
    }
}

/// Trailing return `closes[t-excluded] / closes[t-excluded-window]`, with
/// `t` the newest index.
///
/// `None` when the closes don't reach back far enough or either price is
/// unusable.
pub fn trailing_return(closes: &[f64], window: usize, excluded: usize) -> Option<f64> {
    let end = closes.len().checked_sub(1 + excluded)?;
    let start = end.checked_sub(window)?;
    let (start_px, end_px) = (closes[start], closes[end]);
    if !start_px.is_finite() || !end_px.is_finite() || start_px <= 0.0 {
        return None;
    }
    let ret = end_px / start_px;
    ret.is_finite().then_some(ret)
}

/// Two substitutable instruments; `primary` is the initial choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentPair {
    pub primary: Instrument,
    pub alternate: Instrument,
}

impl InstrumentPair {
    pub fn new(primary: &str, alternate: &str) -> Self {
        Self {
            primary: Instrument::new(primary),
            alternate: Instrument::new(alternate),
        }
    }

    pub fn contains(&self, instrument: &Instrument) -> bool {
        &self.primary == instrument || &self.alternate == instrument
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PairSlot {
    Bond,
    Equity,
}

/// Current pick within each pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub bond_choice: Instrument,
    pub equity_choice: Instrument,
}

impl SelectionState {
    pub fn choice(&self, slot: PairSlot) -> &Instrument {
        match slot {
            PairSlot::Bond => &self.bond_choice,
            PairSlot::Equity => &self.equity_choice,
        }
    }
}

/// Selection changes made during one refresh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionUpdate {
    pub bond_switched: bool,
    pub equity_switched: bool,
}

impl SelectionUpdate {
    pub fn any(&self) -> bool {
        self.bond_switched || self.equity_switched
    }
}

/// Picks the stronger trailing performer within the bond pair and the
/// equity pair. Switches only on a strictly higher return; ties and
/// missing data keep the prior pick.
pub struct AssetSelector {
    bond_pair: InstrumentPair,
    equity_pair: InstrumentPair,
    window: usize,
    excluded: usize,
    state: SelectionState,
}

impl AssetSelector {
    pub fn new(bond_pair: InstrumentPair, equity_pair: InstrumentPair, window: usize, excluded: usize) -> Self {
        let state = SelectionState {
            bond_choice: bond_pair.primary.clone(),
            equity_choice: equity_pair.primary.clone(),
        };
        Self {
            bond_pair,
            equity_pair,
            window,
            excluded,
            state,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn pair(&self, slot: PairSlot) -> &InstrumentPair {
        match slot {
            PairSlot::Bond => &self.bond_pair,
            PairSlot::Equity => &self.equity_pair,
        }
    }

    /// Closes to request from the host per instrument
    pub fn lookback_sessions(&self) -> usize {
        self.window + self.excluded + 1
    }

    /// Apply the switching rule to one pair given `(primary, alternate)`
    /// trailing returns. Returns true when the pick changed.
    pub fn select(&mut self, slot: PairSlot, returns: (Option<f64>, Option<f64>)) -> bool {
        let pair = self.pair(slot).clone();
        let winner = match returns {
            (Some(a), Some(b)) if a > b => Some(pair.primary),
            (Some(a), Some(b)) if b > a => Some(pair.alternate),
            _ => None,
        };

        let Some(winner) = winner else {
            debug!(?slot, ?returns, "selection unchanged: tie or missing data");
            return false;
        };

        let current = match slot {
            PairSlot::Bond => &mut self.state.bond_choice,
            PairSlot::Equity => &mut self.state.equity_choice,
        };
        if *current == winner {
            return false;
        }

        info!(?slot, from = %current, to = %winner, ?returns, "selection switched");
        *current = winner;
        true
    }

    /// Recompute trailing returns for both pairs from fresh host history
    pub fn refresh<H: TrailingHistory + ?Sized>(&mut self, history: &H) -> SelectionUpdate {
        let bond_returns = self.pair_returns(PairSlot::Bond, history);
        let equity_returns = self.pair_returns(PairSlot::Equity, history);
        SelectionUpdate {
            bond_switched: self.select(PairSlot::Bond, bond_returns),
            equity_switched: self.select(PairSlot::Equity, equity_returns),
        }
    }

    fn pair_returns<H: TrailingHistory + ?Sized>(&self, slot: PairSlot, history: &H) -> (Option<f64>, Option<f64>) {
        let pair = self.pair(slot);
        let sessions = self.lookback_sessions();
        let ret = |instrument: &Instrument| {
            history
                .trailing_closes(instrument, sessions)
                .and_then(|closes| trailing_return(&closes, self.window, self.excluded))
        };
        (ret(&pair.primary), ret(&pair.alternate))
    }
}

impl Default for AssetSelector {
    fn default() -> Self {
        Self::new(
            InstrumentPair::new("TLT", "TLH"),
            InstrumentPair::new("QQQ", "FDN"),
            DEFAULT_MOMENTUM_WINDOW,
            DEFAULT_EXCLUDED_SESSIONS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_return_skips_excluded_sessions() {
        // 0..=9, window 4, exclude 2: closes[7] / closes[3]
        let closes: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let ret = trailing_return(&closes, 4, 2).unwrap();
        assert!((ret - 8.0 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_trailing_return_insufficient_history() {
        let closes = vec![1.0; 6];
        assert_eq!(trailing_return(&closes, 4, 2), None);
        assert!(trailing_return(&[1.0; 7], 4, 2).is_some());
        assert!(trailing_return(&[1.0; 7], 4, 1).is_some());
        assert_eq!(trailing_return(&[0.0, 1.0, 2.0], 1, 1), None);
    }

    #[test]
    fn test_picks_higher_then_switches() {
        let mut selector = AssetSelector::default();
        assert_eq!(selector.state().equity_choice, Instrument::new("QQQ"));

        // FDN leads
        assert!(selector.select(PairSlot::Equity, (Some(1.05), Some(1.10))));
        assert_eq!(selector.state().equity_choice, Instrument::new("FDN"));

        // QQQ leads next session
        assert!(selector.select(PairSlot::Equity, (Some(1.08), Some(1.02))));
        assert_eq!(selector.state().equity_choice, Instrument::new("QQQ"));
    }

    #[test]
    fn test_tie_and_missing_keep_choice() {
        let mut selector = AssetSelector::default();
        selector.select(PairSlot::Bond, (Some(0.98), Some(1.01)));
        assert_eq!(selector.state().bond_choice, Instrument::new("TLH"));

        assert!(!selector.select(PairSlot::Bond, (Some(1.03), Some(1.03))));
        assert!(!selector.select(PairSlot::Bond, (Some(1.50), None)));
        assert!(!selector.select(PairSlot::Bond, (None, None)));
        assert_eq!(selector.state().bond_choice, Instrument::new("TLH"));
    }

    #[test]
    fn test_refresh_from_trailing_history() {
        let mut selector = AssetSelector::new(
            InstrumentPair::new("TLT", "TLH"),
            InstrumentPair::new("QQQ", "FDN"),
            3,
            1,
        );
        let mut history: HashMap<Instrument, Vec<f64>> = HashMap::new();
        // Window covers closes[1] -> closes[4]; the last close is excluded
        history.insert(Instrument::new("QQQ"), vec![50.0, 100.0, 101.0, 103.0, 105.0, 10.0]);
        history.insert(Instrument::new("FDN"), vec![50.0, 100.0, 104.0, 108.0, 110.0, 300.0]);
        history.insert(Instrument::new("TLT"), vec![100.0; 6]);
        history.insert(Instrument::new("TLH"), vec![100.0; 6]);

        let update = selector.refresh(&history);
        assert!(update.equity_switched);
        assert!(!update.bond_switched);
        assert_eq!(selector.state().equity_choice, Instrument::new("FDN"));
        assert_eq!(selector.state().bond_choice, Instrument::new("TLT"));
        assert_eq!(selector.lookback_sessions(), 5);
    }
}
