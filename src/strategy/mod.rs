pub mod signals;
pub mod regime;
pub mod selection;
pub mod rebalance;
pub mod execution;
pub mod engine;

pub use signals::{MomentumSignalEngine, MomentumSnapshot, SignalUniverse, SpreadDefinition};
pub use regime::{FlipPair, Regime, RegimeState, RegimeStateMachine, RegimeUpdate};
pub use selection::{AssetSelector, InstrumentPair, PairSlot, SelectionState, SelectionUpdate, TrailingHistory};
pub use rebalance::{InMarketCadence, RebalancePlanner};
pub use execution::{OrderIntent, OrderPlanner};
pub use engine::{InOutEngine, SessionContext, SessionDiagnostics, SessionOutcome};
