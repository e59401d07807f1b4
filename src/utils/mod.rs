pub mod config;
pub mod logger;

pub use config::{
    Config, LoggingConfig, RebalanceConfig, RegimeConfig, SelectionConfig, SignalConfig, UniverseConfig,
};
pub use logger::{init_logger, init_from_config};
