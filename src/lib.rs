pub mod data;
pub mod strategy;
pub mod portfolio;
pub mod backtest;
pub mod runtime;
pub mod utils;
pub mod error;

// Re-export commonly used types
pub use data::{Instrument, PriceBar, PriceHistoryStore, SignalKey, WeightPlan, DailyCloseLog};
pub use strategy::{
    InOutEngine, SessionContext, SessionOutcome, SessionDiagnostics,
    MomentumSignalEngine, RegimeStateMachine, AssetSelector, RebalancePlanner, OrderPlanner,
};
pub use portfolio::{Portfolio, PortfolioValuation};
pub use backtest::{BacktestEngine, BacktestConfig, BacktestResults, SyntheticMarket, TradingSession};
pub use runtime::{HostEvent, SessionDriver};
pub use error::{ConfigError, EngineError};
pub use utils::Config;
