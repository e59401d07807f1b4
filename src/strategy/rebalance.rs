use crate::data::WeightPlan;
use crate::strategy::regime::{Regime, RegimeState};
use crate::strategy::selection::SelectionState;
use serde::{Deserialize, Serialize};

/// When an in-market plan is handed to execution.
/// Out-of-market plans are always submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InMarketCadence {
    Daily,
    /// Last trading session of the week only
    #[default]
    WeekEnd,
}

impl InMarketCadence {
    pub fn should_submit(&self, regime: Regime, week_end: bool) -> bool {
        match (regime, self) {
            (Regime::Out, _) => true,
            (Regime::In, InMarketCadence::Daily) => true,
            (Regime::In, InMarketCadence::WeekEnd) => week_end,
        }
    }
}

/// Stateless mapping from regime and selection to target weights.
pub struct RebalancePlanner;

impl RebalancePlanner {
    /// IN: full weight on the equity pick, bond pick flattened.
    /// OUT: the reverse.
    pub fn plan(regime: &RegimeState, selection: &SelectionState) -> WeightPlan {
        let (hold, flatten) = match regime.regime() {
            Regime::In => (&selection.equity_choice, &selection.bond_choice),
            Regime::Out => (&selection.bond_choice, &selection.equity_choice),
        };
        WeightPlan::new()
            .with(flatten.clone(), 0.0)
            .with(hold.clone(), 1.0)
    }
}
