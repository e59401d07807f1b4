use crate::data::Instrument;
use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration loading and validation failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures at the execution and portfolio boundary.
/// The signal core itself never errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no price available for {0}")]
    MissingPrice(Instrument),

    #[error("no holding for {0}")]
    UnknownHolding(Instrument),

    #[error("cannot sell {requested} {instrument}: only {held} held")]
    InsufficientQuantity {
        instrument: Instrument,
        requested: Decimal,
        held: Decimal,
    },

    #[error("non-finite value for {0}")]
    NonFinite(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
