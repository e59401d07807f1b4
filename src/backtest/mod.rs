pub mod engine;
pub mod synthetic;

pub use engine::{BacktestConfig, BacktestEngine, BacktestResults, EquityPoint, TradingSession};
pub use synthetic::SyntheticMarket;
